use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::rate_limit::default_delay_for_service;
use crate::retry::RetryConfig;

/// Default Clockify REST base URL.
pub const CLOCKIFY_BASE_URL: &str = "https://api.clockify.me/api/v1";

/// Default Toggl Track REST base URL.
pub const TOGGL_BASE_URL: &str = "https://api.track.toggl.com/api/v9";

/// Default Toggl detailed-report base URL (used for time entries).
pub const TOGGL_REPORTS_URL: &str = "https://api.track.toggl.com/reports/api/v2";

/// Default page size for `page`/`page-size` listings.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// The two time-tracking services the engine moves data between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Clockify,
    Toggl,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 2] = [ServiceKind::Clockify, ServiceKind::Toggl];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Clockify => "clockify",
            ServiceKind::Toggl => "toggl",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            ServiceKind::Clockify => "Clockify",
            ServiceKind::Toggl => "Toggl Track",
        }
    }

    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            ServiceKind::Clockify => CLOCKIFY_BASE_URL,
            ServiceKind::Toggl => TOGGL_BASE_URL,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clockify" => Ok(ServiceKind::Clockify),
            "toggl" | "toggl-track" | "toggltrack" => Ok(ServiceKind::Toggl),
            other => Err(format!(
                "unknown service '{other}' (expected 'clockify' or 'toggl')"
            )),
        }
    }
}

/// Everything needed to talk to one service account.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub kind: ServiceKind,
    /// Clockify API key or Toggl API token.
    pub token: String,
    pub base_url: String,
    /// Toggl reports API base; unused for Clockify.
    pub reports_url: Option<String>,
    /// Minimum spacing between requests.
    pub request_delay: Duration,
    pub retry: RetryConfig,
    pub page_size: usize,
}

impl ServiceSettings {
    /// Settings with the vendor defaults for `kind`.
    pub fn new(kind: ServiceKind, token: impl Into<String>) -> Self {
        Self {
            kind,
            token: token.into(),
            base_url: kind.default_base_url().to_string(),
            reports_url: match kind {
                ServiceKind::Clockify => None,
                ServiceKind::Toggl => Some(TOGGL_REPORTS_URL.to_string()),
            },
            request_delay: default_delay_for_service(kind),
            retry: RetryConfig::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_reports_url(mut self, reports_url: impl Into<String>) -> Self {
        self.reports_url = Some(reports_url.into().trim_end_matches('/').to_string());
        self
    }

    #[must_use]
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
