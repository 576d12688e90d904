//! HTTP transport for the Marketo REST and bulk APIs

use super::endpoints;
use super::types::*;
use super::MarketoApi;
use crate::config::Config;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Error code Marketo returns for a filter the instance does not support
const UNSUPPORTED_FILTER_CODE: &str = "1035";

/// reqwest-backed [`MarketoApi`]
pub struct HttpClient {
    client: Client,
    base_url: String,
    identity_url: String,
    client_id: String,
    client_secret: String,
    access_token: String,
    max_daily_calls: u64,
    calls: AtomicU64,
}

impl HttpClient {
    /// Build an unauthenticated client
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            identity_url: config.identity_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            access_token: String::new(),
            max_daily_calls: config.max_daily_calls,
            calls: AtomicU64::new(0),
        })
    }

    /// Build, authenticate, and seed the call counter from today's usage
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut client = Self::new(config)?;
        client.authenticate().await?;
        client.refresh_usage().await?;
        Ok(client)
    }

    /// Fetch an access token from the identity service
    pub async fn authenticate(&mut self) -> Result<()> {
        let url = endpoints::token_url(&self.identity_url);
        let token: AccessToken = self
            .client
            .get(&url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(expires_in = ?token.expires_in, "Authenticated with Marketo");
        self.access_token = token.access_token;
        Ok(())
    }

    /// Seed the call counter with the calls already made today
    pub async fn refresh_usage(&self) -> Result<()> {
        let url = endpoints::usage_url(&self.base_url);
        let response = self.call(self.client.get(&url)).await?;
        let used = response
            .result
            .first()
            .and_then(|row| row.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        info!(used, max = self.max_daily_calls, "Daily API usage");
        self.calls.store(used, Ordering::SeqCst);
        Ok(())
    }

    /// Calls counted so far today
    pub fn calls_made(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Probe whether lead exports can filter on `updatedAt` ("Corona")
    pub async fn detect_corona(&self) -> Result<bool> {
        let end = Utc::now();
        let start = end - ChronoDuration::days(1);
        let filter = json!({
            "updatedAt": {
                "startAt": start.to_rfc3339_opts(SecondsFormat::Secs, false),
                "endAt": end.to_rfc3339_opts(SecondsFormat::Secs, false),
            }
        });

        match self
            .create_export(ExportKind::Leads, &["id".to_string()], &filter)
            .await
        {
            Ok(export_id) => {
                self.cancel_export(ExportKind::Leads, &export_id).await?;
                Ok(true)
            },
            Err(SyncError::Api { code, .. }) if code == UNSUPPORTED_FILTER_CODE => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Cancel a created or queued export
    pub async fn cancel_export(&self, kind: ExportKind, export_id: &str) -> Result<()> {
        let url = endpoints::export_cancel_url(&self.base_url, kind, export_id);
        self.call(self.client.post(&url)).await?;
        debug!(%kind, export_id, "Cancelled export");
        Ok(())
    }

    fn count_call(&self) -> Result<()> {
        let made = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if made > self.max_daily_calls {
            return Err(SyncError::QuotaExceeded(self.max_daily_calls));
        }
        Ok(())
    }

    /// Send an authenticated request and unwrap the Marketo envelope
    async fn call(&self, request: RequestBuilder) -> Result<ApiResponse> {
        self.count_call()?;

        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse = response.json().await?;
        if !body.success {
            let (code, message) = body
                .first_error()
                .map(|e| (e.code(), e.message.clone()))
                .unwrap_or_else(|| ("unknown".to_string(), "no error detail".to_string()));
            warn!(%code, %message, "Marketo request failed");
            return Err(SyncError::api(code, message));
        }
        Ok(body)
    }

    fn first_result_str(response: &ApiResponse, key: &str) -> Result<String> {
        response
            .result
            .first()
            .and_then(|row| row.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SyncError::api("missing_field", format!("response has no '{}'", key)))
    }
}

/// Map "this export does not exist" answers onto `ExportUnavailable`
fn export_gone(err: SyncError, export_id: &str) -> SyncError {
    match err {
        SyncError::Http(ref e) if e.status() == Some(StatusCode::NOT_FOUND) => {
            SyncError::ExportUnavailable(export_id.to_string())
        },
        SyncError::Api { ref message, .. } if message.to_lowercase().contains("not found") => {
            SyncError::ExportUnavailable(export_id.to_string())
        },
        other => other,
    }
}

#[async_trait]
impl MarketoApi for HttpClient {
    async fn create_export(
        &self,
        kind: ExportKind,
        fields: &[String],
        filter: &Value,
    ) -> Result<String> {
        let url = endpoints::export_create_url(&self.base_url, kind);
        let body = CreateExportRequest {
            fields,
            format: "CSV",
            filter,
        };

        let response = self.call(self.client.post(&url).json(&body)).await?;
        let export_id = Self::first_result_str(&response, "exportId")?;
        info!(%kind, %export_id, "Created export");
        Ok(export_id)
    }

    async fn enqueue_export(&self, kind: ExportKind, export_id: &str) -> Result<()> {
        let url = endpoints::export_enqueue_url(&self.base_url, kind, export_id);
        self.call(self.client.post(&url))
            .await
            .map_err(|e| export_gone(e, export_id))?;
        info!(%kind, export_id, "Enqueued export");
        Ok(())
    }

    async fn export_status(&self, kind: ExportKind, export_id: &str) -> Result<ExportStatus> {
        let url = endpoints::export_status_url(&self.base_url, kind, export_id);
        let response = self
            .call(self.client.get(&url))
            .await
            .map_err(|e| export_gone(e, export_id))?;

        let status = Self::first_result_str(&response, "status")?;
        status
            .parse::<ExportStatus>()
            .map_err(|msg| SyncError::api("status", msg))
    }

    async fn download_export(
        &self,
        kind: ExportKind,
        export_id: &str,
        out: &mut (dyn Write + Send),
    ) -> Result<u64> {
        self.count_call()?;
        let url = endpoints::export_file_url(&self.base_url, kind, export_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| export_gone(e.into(), export_id))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        out.flush()?;

        debug!(%kind, export_id, bytes = written, "Downloaded export file");
        Ok(written)
    }

    async fn request(&self, path: &str, params: &[(&str, String)]) -> Result<ApiResponse> {
        let url = endpoints::rest_url(&self.base_url, path);
        self.call(self.client.get(&url).query(params)).await
    }
}
