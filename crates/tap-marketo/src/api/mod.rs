//! Marketo transport
//!
//! [`MarketoApi`] is the seam between the sync engine and the network. The
//! engine never caches anything it learns through it: export status is
//! re-queried on every poll.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::HttpClient;
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::io::Write;

/// Calls the sync engine makes against Marketo
#[async_trait]
pub trait MarketoApi: Send + Sync {
    /// Create (but do not start) a bulk export; returns its id
    async fn create_export(&self, kind: ExportKind, fields: &[String], filter: &Value)
        -> Result<String>;

    /// Queue a created export for processing
    async fn enqueue_export(&self, kind: ExportKind, export_id: &str) -> Result<()>;

    /// Current status of an export.
    ///
    /// Fails with [`crate::error::SyncError::ExportUnavailable`] once the
    /// export no longer exists.
    async fn export_status(&self, kind: ExportKind, export_id: &str) -> Result<ExportStatus>;

    /// Write the completed export file to `out`; returns bytes written
    async fn download_export(
        &self,
        kind: ExportKind,
        export_id: &str,
        out: &mut (dyn Write + Send),
    ) -> Result<u64>;

    /// GET a REST path such as `rest/v1/lists.json`
    async fn request(&self, path: &str, params: &[(&str, String)]) -> Result<ApiResponse>;
}
