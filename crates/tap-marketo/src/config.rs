//! Tap configuration
//!
//! Loaded from the Singer `--config` JSON file, then overridden by any
//! `MARKETO_*` environment variables (a `.env` file is honoured).

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tap_common::TapError;

/// Marketo connection and sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// REST endpoint, e.g. `https://123-ABC-456.mktorest.com/rest`
    pub endpoint: String,

    /// Identity endpoint; derived from `endpoint` when absent
    #[serde(default)]
    pub identity: Option<String>,

    pub client_id: String,

    pub client_secret: String,

    /// Initial replication cursor for streams without a bookmark
    pub start_date: String,

    /// Whether the instance supports `updatedAt` lead exports; probed when absent
    #[serde(default)]
    pub use_corona: Option<bool>,

    #[serde(default = "default_max_daily_calls")]
    pub max_daily_calls: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_max_daily_calls() -> u64 {
    8000
}

fn default_poll_interval() -> u64 {
    60
}

fn default_job_timeout() -> u64 {
    10800 // 3 hours
}

fn default_request_timeout() -> u64 {
    300
}

impl Config {
    /// Load the config file, apply environment overrides, and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| TapError::config(format!("{}: {}", path.display(), e)))?;

        let config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Override fields with `MARKETO_*` environment variables
    pub fn merge_env(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("MARKETO_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Ok(identity) = std::env::var("MARKETO_IDENTITY") {
            self.identity = Some(identity);
        }
        if let Ok(client_id) = std::env::var("MARKETO_CLIENT_ID") {
            self.client_id = client_id;
        }
        if let Ok(client_secret) = std::env::var("MARKETO_CLIENT_SECRET") {
            self.client_secret = client_secret;
        }
        if let Ok(start_date) = std::env::var("MARKETO_START_DATE") {
            self.start_date = start_date;
        }
        if let Some(use_corona) = std::env::var("MARKETO_USE_CORONA")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.use_corona = Some(use_corona);
        }
        self.max_daily_calls = env_u64("MARKETO_MAX_DAILY_CALLS").unwrap_or(self.max_daily_calls);
        self.poll_interval_secs =
            env_u64("MARKETO_POLL_INTERVAL_SECS").unwrap_or(self.poll_interval_secs);
        self.job_timeout_secs = env_u64("MARKETO_JOB_TIMEOUT_SECS").unwrap_or(self.job_timeout_secs);
        self.request_timeout_secs =
            env_u64("MARKETO_REQUEST_TIMEOUT_SECS").unwrap_or(self.request_timeout_secs);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(TapError::config("endpoint must not be empty").into());
        }
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(TapError::config("client_id and client_secret are required").into());
        }
        if self.job_timeout_secs == 0 {
            return Err(TapError::config("job_timeout_secs must be greater than 0").into());
        }
        self.start_date()?;
        Ok(())
    }

    /// `start_date` parsed as UTC
    pub fn start_date(&self) -> Result<DateTime<Utc>> {
        let parsed = DateTime::parse_from_rfc3339(&self.start_date).map_err(|e| {
            TapError::config(format!("start_date '{}' is not RFC 3339: {}", self.start_date, e))
        })?;
        Ok(parsed.with_timezone(&Utc))
    }

    /// Scheme + host, without the trailing `/rest`
    pub fn base_url(&self) -> String {
        let trimmed = self.endpoint.trim_end_matches('/');
        trimmed.strip_suffix("/rest").unwrap_or(trimmed).to_string()
    }

    pub fn identity_url(&self) -> String {
        match &self.identity {
            Some(identity) => identity.trim_end_matches('/').to_string(),
            None => format!("{}/identity", self.base_url()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
