//! Timehop - move time-tracking records between Clockify and Toggl Track.
//!
//! The library fetches workspaces, users, clients, tags, projects, tasks and
//! time entries from one service, links them to their counterparts on the
//! other by name, and creates what is missing on the target in dependency
//! order. It can also bulk-delete records from a single service.
//!
//! # Example
//!
//! ```ignore
//! use timehop::{EntityGroup, ServiceClient, ServiceKind, ServiceSettings, TransferEngine};
//!
//! let source = ServiceClient::new(&ServiceSettings::new(ServiceKind::Clockify, api_key))?;
//! let target = ServiceClient::new(&ServiceSettings::new(ServiceKind::Toggl, api_token))?;
//!
//! let mut engine = TransferEngine::builder().source(source).target(target).build()?;
//! engine.run_fetch().await?;
//! engine.set_group_included(EntityGroup::Tags, false);
//! let report = engine.run_create().await?;
//! println!("created {} records", report.total_processed());
//! ```

pub mod clockify;
pub mod entity;
pub mod handlers;
pub mod http;
pub mod link;
pub mod retry;
pub mod service;
pub mod sync;
pub mod toggl;

pub use entity::{
    EntityDetails, EntityGroup, EntityRecord, EntityStore, IdMaps, Operation, OperationStatus,
    Side,
};
pub use handlers::{EntityHandlers, HandlerRegistry};
pub use http::{HttpTransport, ReqwestTransport};
pub use service::{ServiceClient, ServiceError, ServiceKind, ServiceSettings};
pub use sync::{
    DateRange, ProgressCallback, RunError, RunReport, SyncProgress, TransferEngine, TransferMode,
    TransferOptions,
};
