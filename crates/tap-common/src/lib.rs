//! Tap Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Singer plumbing shared by taps in this workspace.
//!
//! # Overview
//!
//! - **Error Handling**: `TapError` and the `Result` alias
//! - **Logging**: tracing subscriber setup (stderr, files, JSON)
//! - **Catalog**: stream descriptors, field schemas and the selection predicate
//! - **State**: per-stream bookmarks and the `currently_syncing` marker
//! - **Messages**: the `SCHEMA` / `RECORD` / `STATE` writer
//!
//! # Example
//!
//! ```no_run
//! use tap_common::{Catalog, Result, State};
//!
//! fn load(catalog_path: &str, state_path: &str) -> Result<(Catalog, State)> {
//!     let catalog = Catalog::from_file(catalog_path)?;
//!     let state = State::from_file(state_path)?;
//!     Ok((catalog, state))
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod logging;
pub mod messages;
pub mod state;

// Re-export commonly used types
pub use catalog::{Catalog, FieldSchema, Stream, StreamSchema};
pub use error::{Result, TapError};
pub use messages::{Emitter, SingerWriter};
pub use state::{Bookmark, State};
