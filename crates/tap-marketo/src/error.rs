//! Error types for the Marketo tap

use tap_common::TapError;
use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised while extracting from Marketo
#[derive(Error, Debug)]
pub enum SyncError {
    /// The export reached a failed or cancelled status
    #[error("Export {export_id} failed with status {status}")]
    ExportFailed { export_id: String, status: String },

    /// The export no longer exists on the remote side
    #[error("Export {0} is no longer available")]
    ExportUnavailable(String),

    /// The export did not finish within the job timeout
    #[error("Export {export_id} timed out after {minutes} minutes")]
    ExportTimeout { export_id: String, minutes: u64 },

    /// Catalog names a stream the tap has no driver for
    #[error("Stream {0} not implemented")]
    UnknownStream(String),

    /// A raw value did not match its declared schema type
    #[error("Cannot format field '{field}' value {value:?} as {expected}")]
    Format {
        field: String,
        value: String,
        expected: String,
    },

    /// Marketo answered with `success: false`
    #[error("Marketo API error {code}: {message}")]
    Api { code: String, message: String },

    /// The configured daily call budget is spent
    #[error("Daily API quota of {0} calls exceeded")]
    QuotaExceeded(u64),

    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read export payload: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] TapError),
}

impl SyncError {
    /// Create an API error
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an export failure
    pub fn export_failed(export_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::ExportFailed {
            export_id: export_id.into(),
            status: status.into(),
        }
    }

    /// Create a formatting error
    pub fn format(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::Format {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Whether this error means the bookmarked export must be abandoned
    pub fn invalidates_export(&self) -> bool {
        matches!(
            self,
            Self::ExportFailed { .. } | Self::ExportUnavailable(_) | Self::ExportTimeout { .. }
        )
    }
}
