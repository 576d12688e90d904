//! Common test utilities for tap-marketo sync tests
//!
//! - [`MockApi`]: a scripted in-memory [`MarketoApi`]
//! - [`RecordingEmitter`]: captures every SCHEMA / RECORD / STATE message
//! - Catalog and context builders
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{MockApi, RecordingEmitter};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let api = MockApi::new().with_export_files(["id,updatedAt\n1,2024-01-01T00:00:00Z\n"]);
//!     let mut output = RecordingEmitter::default();
//!     // build a SyncContext and run a driver
//! }
//! ```

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tap_common::{Emitter, State, Stream};
use tap_marketo::api::{ApiResponse, ExportKind, ExportStatus, MarketoApi};
use tap_marketo::{Result, SyncError, SyncSettings};

/// An export created through the mock
#[derive(Debug, Clone)]
pub struct CreatedExport {
    pub id: String,
    pub kind: ExportKind,
    pub fields: Vec<String>,
    pub filter: Value,
}

/// A REST request made through the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct Inner {
    export_files: VecDeque<String>,
    files: HashMap<String, String>,
    statuses: HashMap<String, VecDeque<ExportStatus>>,
    next_export_statuses: VecDeque<Vec<ExportStatus>>,
    unavailable: HashSet<String>,
    pages: HashMap<String, VecDeque<ApiResponse>>,
    created: Vec<CreatedExport>,
    enqueued: Vec<String>,
    requests: Vec<RecordedRequest>,
    status_polls: usize,
}

/// Scripted Marketo transport
///
/// Exports complete immediately unless a status sequence is scripted. Each
/// created export takes the next queued CSV file (an empty payload once the
/// queue runs dry). REST requests pop the next scripted page for their path
/// and fail once none are left.
#[derive(Default)]
pub struct MockApi {
    inner: Mutex<Inner>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// CSV payloads handed to exports in creation order
    pub fn with_export_files<I, S>(self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .lock()
            .unwrap()
            .export_files
            .extend(files.into_iter().map(Into::into));
        self
    }

    /// Payload for an export that already exists (e.g. one bookmarked in state)
    pub fn with_existing_export(self, export_id: &str, csv: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .files
            .insert(export_id.to_string(), csv.to_string());
        self
    }

    /// Statuses reported for `export_id`, one per poll; the last one sticks
    pub fn with_statuses(self, export_id: &str, statuses: Vec<ExportStatus>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .statuses
            .insert(export_id.to_string(), statuses.into());
        self
    }

    /// Statuses for the next export to be created
    pub fn with_next_export_statuses(self, statuses: Vec<ExportStatus>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .next_export_statuses
            .push_back(statuses);
        self
    }

    /// Make `export_id` look deleted
    pub fn with_unavailable(self, export_id: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .unavailable
            .insert(export_id.to_string());
        self
    }

    /// Queue a REST response for `path`
    pub fn with_page(self, path: &str, page: ApiResponse) -> Self {
        self.inner
            .lock()
            .unwrap()
            .pages
            .entry(path.to_string())
            .or_default()
            .push_back(page);
        self
    }

    pub fn created(&self) -> Vec<CreatedExport> {
        self.inner.lock().unwrap().created.clone()
    }

    pub fn enqueued(&self) -> Vec<String> {
        self.inner.lock().unwrap().enqueued.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn status_polls(&self) -> usize {
        self.inner.lock().unwrap().status_polls
    }
}

#[async_trait]
impl MarketoApi for MockApi {
    async fn create_export(
        &self,
        kind: ExportKind,
        fields: &[String],
        filter: &Value,
    ) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        let id = format!("export-{}", inner.created.len() + 1);

        let file = inner.export_files.pop_front().unwrap_or_default();
        inner.files.insert(id.clone(), file);
        if let Some(statuses) = inner.next_export_statuses.pop_front() {
            inner.statuses.insert(id.clone(), statuses.into());
        }
        inner.created.push(CreatedExport {
            id: id.clone(),
            kind,
            fields: fields.to_vec(),
            filter: filter.clone(),
        });
        Ok(id)
    }

    async fn enqueue_export(&self, _kind: ExportKind, export_id: &str) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .enqueued
            .push(export_id.to_string());
        Ok(())
    }

    async fn export_status(&self, _kind: ExportKind, export_id: &str) -> Result<ExportStatus> {
        let mut inner = self.inner.lock().unwrap();
        inner.status_polls += 1;

        if inner.unavailable.contains(export_id) {
            return Err(SyncError::ExportUnavailable(export_id.to_string()));
        }
        if !inner.files.contains_key(export_id) {
            return Err(SyncError::ExportUnavailable(export_id.to_string()));
        }

        match inner.statuses.get_mut(export_id) {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap()),
            Some(queue) => Ok(queue.front().copied().unwrap_or(ExportStatus::Completed)),
            None => Ok(ExportStatus::Completed),
        }
    }

    async fn download_export(
        &self,
        _kind: ExportKind,
        export_id: &str,
        out: &mut (dyn Write + Send),
    ) -> Result<u64> {
        let file = self
            .inner
            .lock()
            .unwrap()
            .files
            .get(export_id)
            .cloned()
            .ok_or_else(|| SyncError::ExportUnavailable(export_id.to_string()))?;
        out.write_all(file.as_bytes())?;
        Ok(file.len() as u64)
    }

    async fn request(&self, path: &str, params: &[(&str, String)]) -> Result<ApiResponse> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(RecordedRequest {
            path: path.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });

        inner
            .pages
            .get_mut(path)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| SyncError::api("604", format!("no scripted response for {}", path)))
    }
}

/// One captured Singer message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Schema { stream: String, schema: Value },
    Record { stream: String, record: Map<String, Value> },
    State(State),
}

/// Emitter that keeps every message in memory
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    pub messages: Vec<Message>,
}

impl RecordingEmitter {
    pub fn records(&self, stream: &str) -> Vec<Map<String, Value>> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Record { stream: s, record } if s == stream => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<State> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::State(state) => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_state(&self) -> Option<State> {
        self.states().pop()
    }

    pub fn schemas(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Schema { stream, .. } => Some(stream.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Emitter for RecordingEmitter {
    fn write_schema(
        &mut self,
        stream: &str,
        schema: &Value,
        _key_properties: &[String],
    ) -> tap_common::Result<()> {
        self.messages.push(Message::Schema {
            stream: stream.to_string(),
            schema: schema.clone(),
        });
        Ok(())
    }

    fn write_record(&mut self, stream: &str, record: &Map<String, Value>) -> tap_common::Result<()> {
        self.messages.push(Message::Record {
            stream: stream.to_string(),
            record: record.clone(),
        });
        Ok(())
    }

    fn write_state(&mut self, state: &State) -> tap_common::Result<()> {
        self.messages.push(Message::State(state.clone()));
        Ok(())
    }
}

/// Midnight UTC on the given day
pub fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub fn settings(use_corona: bool) -> SyncSettings {
    SyncSettings {
        use_corona,
        start_date: day(2024, 1, 1),
        poll_interval: Duration::ZERO,
        job_timeout: Duration::from_secs(60),
    }
}

pub fn page(rows: Value, next_page_token: Option<&str>) -> ApiResponse {
    let rows = rows.as_array().cloned().unwrap_or_default();
    ApiResponse {
        next_page_token: next_page_token.map(str::to_string),
        ..ApiResponse::with_result(rows)
    }
}

pub fn no_assets_page() -> ApiResponse {
    ApiResponse {
        warnings: vec!["No assets found for the given search criteria.".to_string()],
        ..ApiResponse::default()
    }
}

pub fn leads_stream() -> Stream {
    serde_json::from_value(json!({
        "tap_stream_id": "leads",
        "key_properties": ["id"],
        "replication_key": "updatedAt",
        "schema": {
            "selected": true,
            "properties": {
                "id": {"type": ["integer"], "inclusion": "automatic"},
                "email": {"type": ["null", "string"], "selected": true},
                "updatedAt": {"type": ["null", "string"], "format": "date-time", "inclusion": "automatic"}
            }
        }
    }))
    .unwrap()
}

pub fn activity_stream() -> Stream {
    serde_json::from_value(json!({
        "tap_stream_id": "activities_visit_webpage",
        "key_properties": ["marketoGUID"],
        "replication_key": "activityDate",
        "schema": {
            "selected": true,
            "properties": {
                "marketoGUID": {"type": ["string"], "inclusion": "automatic"},
                "leadId": {"type": ["integer"], "selected": true},
                "activityDate": {"type": ["string"], "format": "date-time", "inclusion": "automatic"},
                "activityTypeId": {"type": ["integer"], "selected": true},
                "primary_attribute_name": {"type": ["null", "string"], "selected": true},
                "primary_attribute_value": {"type": ["null", "string"], "selected": true},
                "primary_attribute_value_id": {"type": ["null", "string"], "selected": true},
                "webpage_url": {"type": ["null", "string"], "selected": true}
            }
        },
        "metadata": [{
            "breadcrumb": [],
            "metadata": {
                "marketo.activity-id": 1,
                "marketo.primary-attribute-name": "webpage_id"
            }
        }]
    }))
    .unwrap()
}

pub fn list_stream(stream_id: &str) -> Stream {
    serde_json::from_value(json!({
        "tap_stream_id": stream_id,
        "key_properties": ["id"],
        "replication_key": "updatedAt",
        "schema": {
            "selected": true,
            "properties": {
                "id": {"type": ["integer"], "inclusion": "automatic"},
                "name": {"type": ["null", "string"], "selected": true},
                "updatedAt": {"type": ["null", "string"], "format": "date-time", "inclusion": "automatic"}
            }
        }
    }))
    .unwrap()
}

pub fn activity_types_stream() -> Stream {
    serde_json::from_value(json!({
        "tap_stream_id": "activity_types",
        "key_properties": ["id"],
        "schema": {
            "selected": true,
            "properties": {
                "id": {"type": ["integer"], "inclusion": "automatic"},
                "name": {"type": ["null", "string"], "selected": true}
            }
        }
    }))
    .unwrap()
}
