//! Configuration file support for timehop.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (e.g. `TIMEHOP_CLOCKIFY_API_KEY`)
//! 3. Local config file (./timehop.toml)
//! 4. XDG config file (~/.config/timehop/config.toml)
//! 5. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [clockify]
//! api_key = "..."          # or use TIMEHOP_CLOCKIFY_API_KEY
//! request_delay_ms = 125
//!
//! [toggl]
//! api_token = "..."        # or use TIMEHOP_TOGGL_API_TOKEN
//! request_delay_ms = 1050
//!
//! [transfer]
//! cooldown_secs = 5
//! max_attempts = 5
//! page_size = 100
//! include_users = false
//! since_days = 365
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use timehop::retry::{MAX_ATTEMPTS, RetryConfig};
use timehop::service::{DEFAULT_PAGE_SIZE, ServiceKind, ServiceSettings};
use timehop::sync::DEFAULT_SINCE_DAYS;

/// Environment variables and the config keys they set.
const ENV_KEYS: &[(&str, &str)] = &[
    ("TIMEHOP_CLOCKIFY_API_KEY", "clockify.api_key"),
    ("TIMEHOP_CLOCKIFY_BASE_URL", "clockify.base_url"),
    ("TIMEHOP_CLOCKIFY_REQUEST_DELAY_MS", "clockify.request_delay_ms"),
    ("TIMEHOP_TOGGL_API_TOKEN", "toggl.api_token"),
    ("TIMEHOP_TOGGL_BASE_URL", "toggl.base_url"),
    ("TIMEHOP_TOGGL_REPORTS_URL", "toggl.reports_url"),
    ("TIMEHOP_TOGGL_REQUEST_DELAY_MS", "toggl.request_delay_ms"),
    ("TIMEHOP_TRANSFER_COOLDOWN_SECS", "transfer.cooldown_secs"),
    ("TIMEHOP_TRANSFER_MAX_ATTEMPTS", "transfer.max_attempts"),
    ("TIMEHOP_TRANSFER_PAGE_SIZE", "transfer.page_size"),
    ("TIMEHOP_TRANSFER_INCLUDE_USERS", "transfer.include_users"),
    ("TIMEHOP_TRANSFER_SINCE_DAYS", "transfer.since_days"),
];

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub clockify: ClockifyConfig,
    pub toggl: TogglConfig,
    /// Defaults for transfer and delete runs.
    pub transfer: TransferConfig,
}

/// Clockify account configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClockifyConfig {
    /// Can also be set via TIMEHOP_CLOCKIFY_API_KEY.
    pub api_key: Option<String>,
    /// Override for the API base (regional or self-hosted deployments).
    pub base_url: Option<String>,
    /// Minimum spacing between requests; the vendor default when unset.
    pub request_delay_ms: Option<u64>,
}

/// Toggl Track account configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TogglConfig {
    /// Can also be set via TIMEHOP_TOGGL_API_TOKEN.
    pub api_token: Option<String>,
    pub base_url: Option<String>,
    pub reports_url: Option<String>,
    pub request_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Pause after a 429 before retrying.
    pub cooldown_secs: u64,
    /// Attempts per request, first try included.
    pub max_attempts: usize,
    pub page_size: usize,
    pub include_users: bool,
    /// Look-back window for time entries when `--since` is not given.
    pub since_days: i64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 5,
            max_attempts: MAX_ATTEMPTS,
            page_size: DEFAULT_PAGE_SIZE,
            include_users: false,
            since_days: DEFAULT_SINCE_DAYS,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Falls back to defaults (with a warning) when a source cannot be read.
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("timehop.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./timehop.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        match Self::from_builder(builder, |name| std::env::var(name).ok()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}", e);
                Config::default()
            }
        }
    }

    /// Apply environment overrides on top of `builder` and deserialize.
    fn from_builder(
        mut builder: config::ConfigBuilder<config::builder::DefaultState>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        for (var, key) in ENV_KEYS {
            builder = builder.set_override_option(*key, env(var))?;
        }
        builder.build()?.try_deserialize()
    }

    /// Connection settings for one side of a run.
    pub fn service_settings(&self, kind: ServiceKind) -> Result<ServiceSettings, String> {
        let (token, base_url, delay_ms) = match kind {
            ServiceKind::Clockify => (
                self.clockify.api_key.as_deref(),
                self.clockify.base_url.as_deref(),
                self.clockify.request_delay_ms,
            ),
            ServiceKind::Toggl => (
                self.toggl.api_token.as_deref(),
                self.toggl.base_url.as_deref(),
                self.toggl.request_delay_ms,
            ),
        };
        let token = token.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
            let (key, var) = match kind {
                ServiceKind::Clockify => ("clockify.api_key", "TIMEHOP_CLOCKIFY_API_KEY"),
                ServiceKind::Toggl => ("toggl.api_token", "TIMEHOP_TOGGL_API_TOKEN"),
            };
            format!("No {kind} credentials configured. Set {key} in config.toml or {var}.")
        })?;

        let mut settings = ServiceSettings::new(kind, token)
            .with_retry(RetryConfig::new(
                Duration::from_secs(self.transfer.cooldown_secs),
                self.transfer.max_attempts,
            ))
            .with_page_size(self.transfer.page_size);
        if let Some(url) = base_url {
            settings = settings.with_base_url(url);
        }
        if let Some(ms) = delay_ms {
            settings = settings.with_request_delay(Duration::from_millis(ms));
        }
        if kind == ServiceKind::Toggl
            && let Some(ref url) = self.toggl.reports_url
        {
            settings = settings.with_reports_url(url);
        }
        Ok(settings)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "timehop").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
