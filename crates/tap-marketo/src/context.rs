//! Everything a sync pass needs besides the catalog and state

use crate::api::MarketoApi;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tap_common::{Emitter, State};

/// Run-wide settings resolved before syncing starts
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Whether lead exports can filter on `updatedAt`
    pub use_corona: bool,
    /// Initial cursor for streams without a bookmark
    pub start_date: DateTime<Utc>,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
}

impl SyncSettings {
    pub fn from_config(config: &Config, use_corona: bool) -> Result<Self> {
        Ok(Self {
            use_corona,
            start_date: config.start_date()?,
            poll_interval: config.poll_interval(),
            job_timeout: config.job_timeout(),
        })
    }
}

/// Collaborators shared by the orchestrator and every stream driver
pub struct SyncContext<'a> {
    pub client: &'a dyn MarketoApi,
    pub output: &'a mut dyn Emitter,
    pub clock: &'a dyn Clock,
    pub settings: SyncSettings,
}

impl<'a> SyncContext<'a> {
    pub fn new(
        client: &'a dyn MarketoApi,
        output: &'a mut dyn Emitter,
        clock: &'a dyn Clock,
        settings: SyncSettings,
    ) -> Self {
        Self {
            client,
            output,
            clock,
            settings,
        }
    }

    /// Emit the current state
    pub fn persist(&mut self, state: &State) -> Result<()> {
        self.output.write_state(state)?;
        Ok(())
    }
}
