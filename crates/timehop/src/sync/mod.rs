//! Transfer orchestration.
//!
//! # Module Structure
//!
//! - `types` - Run options, reports and [`RunError`]
//! - `progress` - Progress reporting: [`SyncProgress`], [`ProgressCallback`], [`emit()`]
//! - [`engine`] - [`TransferEngine`]: fetch, create and delete in dependency order
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use timehop::sync::{ProgressCallback, SyncProgress, TransferEngine};
//!
//! let progress: ProgressCallback = Box::new(|event| {
//!     if let SyncProgress::RecordProcessed { group, completed, total, .. } = event {
//!         println!("{group}: {completed}/{total}");
//!     }
//! });
//! let mut engine = TransferEngine::builder()
//!     .source(source)
//!     .target(target)
//!     .progress(Arc::new(progress))
//!     .build()?;
//! engine.run_fetch().await?;
//! engine.run_create().await?;
//! ```

pub mod engine;
mod progress;
mod types;

pub use types::{
    DateRange, GroupReport, Outcome, Result, RunError, RunReport, TransferMode, TransferOptions,
};

pub use types::{DEFAULT_SINCE_DAYS, TOGGL_REPORT_PAGE_SIZE};

pub use progress::{ProgressCallback, SyncProgress, emit};

pub use engine::{TransferEngine, TransferEngineBuilder};
