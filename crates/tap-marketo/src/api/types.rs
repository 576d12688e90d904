//! Marketo request and response types
//!
//! Only the parts of the wire format the sync engine interprets.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Bulk export family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    Leads,
    Activities,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Leads => "leads",
            ExportKind::Activities => "activities",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a bulk export job as reported by Marketo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportStatus {
    /// Created but not yet enqueued
    Created,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportStatus::Created => "Created",
            ExportStatus::Queued => "Queued",
            ExportStatus::Processing => "Processing",
            ExportStatus::Completed => "Completed",
            ExportStatus::Failed => "Failed",
            ExportStatus::Cancelled => "Cancelled",
        }
    }

    /// The job can never produce a file
    pub fn is_failure(&self) -> bool {
        matches!(self, ExportStatus::Failed | ExportStatus::Cancelled)
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(ExportStatus::Created),
            "Queued" => Ok(ExportStatus::Queued),
            "Processing" => Ok(ExportStatus::Processing),
            "Completed" => Ok(ExportStatus::Completed),
            "Failed" => Ok(ExportStatus::Failed),
            "Cancelled" => Ok(ExportStatus::Cancelled),
            other => Err(format!("unknown export status '{}'", other)),
        }
    }
}

/// Marketo response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    #[serde(default = "default_success")]
    pub success: bool,

    #[serde(default)]
    pub request_id: Option<String>,

    #[serde(default)]
    pub result: Vec<Value>,

    #[serde(default)]
    pub warnings: Vec<String>,

    #[serde(default)]
    pub errors: Vec<ApiErrorEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more_result: Option<bool>,
}

fn default_success() -> bool {
    true
}

impl Default for ApiResponse {
    fn default() -> Self {
        Self {
            success: true,
            request_id: None,
            result: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            next_page_token: None,
            more_result: None,
        }
    }
}

impl ApiResponse {
    /// Successful response carrying `rows`
    pub fn with_result(rows: Vec<Value>) -> Self {
        Self {
            result: rows,
            ..Default::default()
        }
    }

    /// First error, if Marketo reported any
    pub fn first_error(&self) -> Option<&ApiErrorEntry> {
        self.errors.first()
    }
}

/// One entry of the `errors` array
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorEntry {
    /// Marketo sends codes as strings, older endpoints as numbers
    pub code: Value,

    #[serde(default)]
    pub message: String,
}

impl ApiErrorEntry {
    pub fn code(&self) -> String {
        match &self.code {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Response of the identity service
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,

    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Body of a bulk export create request
#[derive(Debug, Clone, Serialize)]
pub struct CreateExportRequest<'a> {
    pub fields: &'a [String],
    pub format: &'static str,
    pub filter: &'a Value,
}
