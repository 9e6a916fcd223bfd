//! Service clients for Clockify and Toggl Track.
//!
//! A [`ServiceClient`] owns everything needed to talk to one account:
//! base URL, credentials, request pacing and 429 handling. Entity handlers
//! build endpoint paths and payloads; the client turns them into requests.
//!
//! # Example
//!
//! ```ignore
//! use timehop::service::{FetchOptions, ServiceClient, ServiceKind, ServiceSettings};
//!
//! let settings = ServiceSettings::new(ServiceKind::Clockify, api_key);
//! let client = ServiceClient::new(&settings)?;
//! let tags: Vec<serde_json::Value> = client
//!     .collect_paginated("/workspaces/abc/tags", &[])
//!     .await?;
//! ```

mod client;
mod errors;
mod pagination;
mod rate_limit;
mod types;

pub use client::{FetchOptions, ServiceClient};
pub use errors::{Result, ServiceError, short_error_message};
pub use pagination::paginate;
pub use rate_limit::{RequestPacer, default_delay_for_service, rate_limits};
pub use types::{
    CLOCKIFY_BASE_URL, DEFAULT_PAGE_SIZE, ServiceKind, ServiceSettings, TOGGL_BASE_URL,
    TOGGL_REPORTS_URL,
};
