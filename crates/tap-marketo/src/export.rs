//! Bulk export window manager
//!
//! Marketo bulk exports cover at most [`MAX_EXPORT_DAYS`] per job. A job's id
//! and window end are bookmarked the moment it is created, so an interrupted
//! run picks the same job back up instead of creating (and paying for) a new
//! one. The bookmark is cleared once the window's rows have been emitted or
//! the job is known to be dead.

use crate::activity::ACTIVITY_FIELDS;
use crate::api::{ExportKind, ExportStatus, MarketoApi};
use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::format::{parse_datetime, to_iso, Record};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde_json::{json, Value};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use tap_common::{State, Stream, TapError};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Widest date range a single export may cover
pub const MAX_EXPORT_DAYS: i64 = 30;

/// `min(start + 30 days, now)`, truncated to whole seconds
pub fn export_end(start: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let end = start + Duration::days(MAX_EXPORT_DAYS);
    end.min(now).trunc_subsecs(0)
}

/// Columns and filter for one export job
#[derive(Debug, Clone, PartialEq)]
pub struct ExportQuery {
    pub fields: Vec<String>,
    pub filter: Value,
}

fn date_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Value {
    json!({"startAt": to_iso(&start), "endAt": to_iso(&end)})
}

/// Build the export query for `stream` over `[start, end)`
pub fn export_query(
    stream: &Stream,
    kind: ExportKind,
    use_corona: bool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<ExportQuery> {
    match kind {
        ExportKind::Leads => {
            // Only Corona instances can filter leads on update time
            let field = if use_corona { "updatedAt" } else { "createdAt" };
            Ok(ExportQuery {
                fields: stream.selected_fields(),
                filter: json!({ field: date_range(start, end) }),
            })
        },
        ExportKind::Activities => {
            let activity_type_id = stream.activity_type_id().ok_or_else(|| {
                TapError::config(format!(
                    "{} has no marketo.activity-id metadata",
                    stream.tap_stream_id
                ))
            })?;
            // createdAt proxies activityDate
            Ok(ExportQuery {
                fields: ACTIVITY_FIELDS.iter().map(|f| f.to_string()).collect(),
                filter: json!({
                    "createdAt": date_range(start, end),
                    "activityTypeIds": [activity_type_id],
                }),
            })
        },
    }
}

/// Whether a bookmarked export can still be used
pub async fn export_available(
    client: &dyn MarketoApi,
    kind: ExportKind,
    export_id: &str,
) -> Result<bool> {
    match client.export_status(kind, export_id).await {
        Ok(status) => Ok(!status.is_failure()),
        Err(SyncError::ExportUnavailable(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Reuse the bookmarked export for `stream` or create one starting at `start`
///
/// Returns the export id and the end of the window it covers.
pub async fn get_or_create_export(
    ctx: &mut SyncContext<'_>,
    state: &mut State,
    stream: &Stream,
    kind: ExportKind,
    start: DateTime<Utc>,
) -> Result<(String, DateTime<Utc>)> {
    let stream_id = stream.tap_stream_id.as_str();
    let bookmarked = state
        .export(stream_id)
        .map(|(id, end)| (id.to_string(), end.to_string()));

    if let Some((export_id, end)) = bookmarked {
        if export_available(ctx.client, kind, &export_id).await? {
            let end = parse_datetime(&end).ok_or_else(|| {
                TapError::InvalidState(format!("{} export_end '{}' is not a timestamp", stream_id, end))
            })?;
            info!(stream = stream_id, %export_id, export_end = %to_iso(&end), "Resuming export");
            return Ok((export_id, end));
        }
        info!(stream = stream_id, %export_id, "Export no longer available");
    }

    let end = export_end(start, ctx.clock.now());
    let query = export_query(stream, kind, ctx.settings.use_corona, start, end)?;
    let export_id = ctx
        .client
        .create_export(kind, &query.fields, &query.filter)
        .await?;

    state.set_export(stream_id, export_id.as_str(), to_iso(&end));
    ctx.persist(state)?;

    info!(
        stream = stream_id,
        %export_id,
        export_start = %to_iso(&start),
        export_end = %to_iso(&end),
        "Created export"
    );
    Ok((export_id, end))
}

async fn poll_until_complete(
    ctx: &SyncContext<'_>,
    kind: ExportKind,
    export_id: &str,
) -> Result<()> {
    let timeout = ctx.settings.job_timeout;
    let deadline = Instant::now() + timeout;

    // The deadline is checked after each status read, so a job finishing
    // during the last sleep is still picked up
    loop {
        let status = ctx.client.export_status(kind, export_id).await?;
        debug!(export_id, %status, "Export status");

        match status {
            ExportStatus::Created => ctx.client.enqueue_export(kind, export_id).await?,
            ExportStatus::Queued | ExportStatus::Processing => {},
            ExportStatus::Completed => return Ok(()),
            ExportStatus::Failed | ExportStatus::Cancelled => {
                return Err(SyncError::export_failed(export_id, status.as_str()));
            },
        }

        if Instant::now() >= deadline {
            return Err(SyncError::ExportTimeout {
                export_id: export_id.to_string(),
                minutes: timeout.as_secs() / 60,
            });
        }
        sleep(ctx.settings.poll_interval).await;
    }
}

/// Block until the export completes
///
/// A failed, cancelled, vanished or timed-out export is dropped from the
/// bookmark (and the state persisted) before the error is returned, so the
/// next run creates a fresh job for the same window.
pub async fn wait_for_export(
    ctx: &mut SyncContext<'_>,
    state: &mut State,
    stream: &Stream,
    kind: ExportKind,
    export_id: &str,
) -> Result<()> {
    match poll_until_complete(ctx, kind, export_id).await {
        Ok(()) => Ok(()),
        Err(e) if e.invalidates_export() => {
            warn!(stream = %stream.tap_stream_id, export_id, error = %e, "Abandoning export");
            state.clear_export(&stream.tap_stream_id);
            ctx.persist(state)?;
            Err(e)
        },
        Err(e) => Err(e),
    }
}

/// Download a completed export and iterate its rows
pub async fn stream_rows(
    client: &dyn MarketoApi,
    kind: ExportKind,
    export_id: &str,
) -> Result<ExportRows> {
    let mut file = tempfile::tempfile()?;

    info!(export_id, "Download starting");
    let bytes = client.download_export(kind, export_id, &mut file).await?;
    file.seek(SeekFrom::Start(0))?;
    info!(export_id, bytes, "Download completed, streaming rows");

    ExportRows::from_reader(file)
}

/// Rows of a downloaded CSV export, keyed by header
///
/// Values are left as strings for the formatter. A row shorter or longer
/// than the header is zipped against it.
pub struct ExportRows<R: Read = File> {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<R>,
}

impl<R: Read> ExportRows<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = reader.headers()?.iter().map(str::to_string).collect();

        Ok(Self {
            headers,
            records: reader.into_records(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl<R: Read> Iterator for ExportRows<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };

        Some(Ok(self
            .headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), Value::String(value.to_string())))
            .collect()))
    }
}
