//! Tap Marketo Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Incremental extraction of Marketo data as a Singer tap.
//!
//! # Streams
//!
//! - **leads**: bulk export in windows of at most 30 days
//! - **activities_\***: bulk export per activity type
//! - **programs**: date-filtered asset query, paged by offset
//! - **campaigns** / **lists**: token-paged REST lists
//! - **activity_types**: one unpaged request
//!
//! # Example
//!
//! ```no_run
//! use tap_common::{Catalog, SingerWriter, State};
//! use tap_marketo::{sync, Config, HttpClient, SyncContext, SyncSettings, SystemClock};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.json")?;
//!     let catalog = Catalog::from_file("catalog.json")?;
//!     let mut state = State::default();
//!
//!     let client = HttpClient::connect(&config).await?;
//!     let use_corona = client.detect_corona().await?;
//!     let mut output = SingerWriter::stdout();
//!     let settings = SyncSettings::from_config(&config, use_corona)?;
//!
//!     let mut ctx = SyncContext::new(&client, &mut output, &SystemClock, settings);
//!     sync(&mut ctx, &catalog, &mut state).await?;
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod api;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod format;
pub mod sync;

pub use api::{HttpClient, MarketoApi};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use context::{SyncContext, SyncSettings};
pub use error::{Result, SyncError};
pub use sync::{sync, StreamKind, SyncSummary};
