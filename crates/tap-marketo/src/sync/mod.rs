//! Sync orchestration
//!
//! Streams are synced one at a time in catalog order. Before a stream starts
//! its id is persisted as `currently_syncing`; an interrupted run resumes at
//! that stream and skips the ones before it.

pub mod activities;
pub mod activity_types;
pub mod leads;
pub mod paginated;
pub mod programs;

use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::format::{parse_datetime, to_iso, Record};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tap_common::logging::record_counter;
use tap_common::{Catalog, State, Stream, TapError};
use tracing::{info, warn};

/// Logged after a run on instances without `updatedAt` lead filtering
pub const NO_CORONA_WARNING: &str = "Your account does not have Corona support enabled. \
     Without Corona, each sync of the Leads table requires a full export which can lead \
     to lower data freshness. Please contact Marketo to request Corona support be added \
     to your account.";

/// How a stream is extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// `leads`: windowed bulk export
    Leads,
    /// `activities_*`: windowed bulk export for one activity type
    Activities,
    /// `programs`: date-filtered, offset-paged list
    Programs,
    /// `campaigns`, `lists`: token-paged list
    Paginated,
    /// `activity_types`: one unpaged request
    ActivityTypes,
}

impl StreamKind {
    pub fn from_stream_id(stream_id: &str) -> Result<Self> {
        match stream_id {
            "leads" => Ok(Self::Leads),
            "programs" => Ok(Self::Programs),
            "campaigns" | "lists" => Ok(Self::Paginated),
            "activity_types" => Ok(Self::ActivityTypes),
            id if id.starts_with("activities_") => Ok(Self::Activities),
            other => Err(SyncError::UnknownStream(other.to_string())),
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Leads => "leads",
            Self::Activities => "activities",
            Self::Programs => "programs",
            Self::Paginated => "paginated",
            Self::ActivityTypes => "activity_types",
        };
        write!(f, "{}", name)
    }
}

/// Records emitted by one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub stream: String,
    pub record_count: u64,
}

/// Outcome of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub streams: Vec<StreamSummary>,
    /// The instance lacks Corona and [`NO_CORONA_WARNING`] was logged
    pub corona_warning: bool,
}

impl SyncSummary {
    pub fn total_records(&self) -> u64 {
        self.streams.iter().map(|s| s.record_count).sum()
    }

    pub fn record_count(&self, stream: &str) -> Option<u64> {
        self.streams
            .iter()
            .find(|s| s.stream == stream)
            .map(|s| s.record_count)
    }
}

/// Sync every selected stream of `catalog`
pub async fn sync(
    ctx: &mut SyncContext<'_>,
    catalog: &Catalog,
    state: &mut State,
) -> Result<SyncSummary> {
    let mut starting_stream = state.currently_syncing().map(str::to_string);

    if let Some(resume) = &starting_stream {
        let resumable = catalog
            .streams
            .iter()
            .any(|s| &s.tap_stream_id == resume && s.is_selected());
        if resumable {
            info!(stream = %resume, "Resuming sync");
        } else {
            warn!(stream = %resume, "Interrupted stream is no longer selected, starting over");
            starting_stream = None;
        }
    } else {
        info!("Starting sync");
    }

    let mut summary = SyncSummary::default();

    for stream in &catalog.streams {
        let stream_id = stream.tap_stream_id.as_str();

        if !stream.is_selected() {
            info!(stream = stream_id, "Not selected");
            continue;
        }

        if let Some(resume) = &starting_stream {
            if resume != stream_id {
                info!(stream = stream_id, "Already synced");
                continue;
            }
        }
        starting_stream = None;

        let kind = StreamKind::from_stream_id(stream_id)?;
        info!(stream = stream_id, %kind, "Starting stream sync");

        if let Some(key) = &stream.replication_key {
            state.ensure_replication_value(stream_id, key, &to_iso(&ctx.settings.start_date));
        }
        state.set_currently_syncing(Some(stream_id));
        ctx.persist(state)?;

        let record_count = match kind {
            StreamKind::Leads => leads::sync_leads(ctx, state, stream).await?,
            StreamKind::Activities => activities::sync_activities(ctx, state, stream).await?,
            StreamKind::Programs => programs::sync_programs(ctx, state, stream).await?,
            StreamKind::Paginated => paginated::sync_paginated(ctx, state, stream).await?,
            StreamKind::ActivityTypes => {
                activity_types::sync_activity_types(ctx, state, stream).await?
            },
        };

        record_counter(stream_id, record_count);

        state.set_currently_syncing(None);
        ctx.persist(state)?;

        info!(stream = stream_id, record_count, "Finished stream sync");
        summary.streams.push(StreamSummary {
            stream: stream_id.to_string(),
            record_count,
        });
    }

    info!(records = summary.total_records(), "Finished sync");

    if !ctx.settings.use_corona {
        warn!("{}", NO_CORONA_WARNING);
        summary.corona_warning = true;
    }

    Ok(summary)
}

/// Emit the stream's `SCHEMA` message
pub(crate) fn write_schema(ctx: &mut SyncContext<'_>, stream: &Stream) -> Result<()> {
    ctx.output.write_schema(
        &stream.tap_stream_id,
        &stream.schema_value()?,
        &stream.key_properties,
    )?;
    Ok(())
}

/// The stream's replication key, or `default` when the catalog omits it
pub(crate) fn replication_key<'s>(stream: &'s Stream, default: &'s str) -> &'s str {
    stream.replication_key.as_deref().unwrap_or(default)
}

/// Bookmarked cursor for `stream_id`, falling back to `start_date`
pub(crate) fn bookmark_datetime(
    ctx: &SyncContext<'_>,
    state: &State,
    stream_id: &str,
    key: &str,
) -> Result<DateTime<Utc>> {
    match state.replication_value(stream_id, key) {
        Some(raw) => parse_datetime(raw).ok_or_else(|| {
            TapError::InvalidState(format!("{} bookmark '{}' is not a timestamp", stream_id, raw))
                .into()
        }),
        None => Ok(ctx.settings.start_date),
    }
}

/// Cursor value of a formatted record; `None` when the record has none
pub(crate) fn record_cursor(record: &Record, key: &str) -> Result<Option<DateTime<Utc>>> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => parse_datetime(raw)
            .map(Some)
            .ok_or_else(|| SyncError::format(key, raw.as_str(), "date-time")),
        Some(other) => Err(SyncError::format(key, other.to_string(), "date-time")),
    }
}

/// Whether a record is at or past `start`; records without a cursor pass
pub(crate) fn at_or_after(record: &Record, key: &str, start: DateTime<Utc>) -> Result<bool> {
    Ok(record_cursor(record, key)?.map_or(true, |cursor| cursor >= start))
}
