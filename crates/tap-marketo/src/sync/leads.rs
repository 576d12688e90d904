//! Leads: windowed bulk export

use super::{bookmark_datetime, record_cursor, replication_key, write_schema};
use crate::api::ExportKind;
use crate::context::SyncContext;
use crate::error::Result;
use crate::export::{get_or_create_export, stream_rows, wait_for_export};
use crate::format::{format_values, to_iso};
use chrono::{Duration, SubsecRound};
use tap_common::{State, Stream};
use tracing::{info, instrument};

/// Corona windows start this far before the bookmark to catch late updates
pub const ATTRIBUTION_WINDOW_DAYS: i64 = 1;

/// Sync the `leads` stream; returns the number of records emitted
///
/// With Corona the export filters on `updatedAt` and the bookmark moves to
/// the end of every window that produced rows. Without it the export can
/// only filter on `createdAt`, so rows older than the run's starting
/// bookmark are dropped client side and the bookmark tracks the newest
/// `updatedAt` seen.
#[instrument(skip_all, fields(stream = %stream.tap_stream_id))]
pub async fn sync_leads(
    ctx: &mut SyncContext<'_>,
    state: &mut State,
    stream: &Stream,
) -> Result<u64> {
    let stream_id = stream.tap_stream_id.as_str();
    let key = replication_key(stream, "updatedAt");
    write_schema(ctx, stream)?;

    let use_corona = ctx.settings.use_corona;
    let initial_bookmark = bookmark_datetime(ctx, state, stream_id, key)?;
    let mut export_start = if use_corona {
        initial_bookmark - Duration::days(ATTRIBUTION_WINDOW_DAYS)
    } else {
        initial_bookmark
    };

    // Whole seconds, so the last window's end can reach it
    let job_started = ctx.clock.now().trunc_subsecs(0);
    let mut max_bookmark = initial_bookmark;
    let mut record_count = 0u64;

    while export_start < job_started {
        let (export_id, export_end) =
            get_or_create_export(ctx, state, stream, ExportKind::Leads, export_start).await?;
        wait_for_export(ctx, state, stream, ExportKind::Leads, &export_id).await?;

        let mut window_count = 0u64;
        for row in stream_rows(ctx.client, ExportKind::Leads, &export_id).await? {
            let record = format_values(stream, &row?)?;

            if use_corona {
                max_bookmark = export_end;
            } else if let Some(cursor) = record_cursor(&record, key)? {
                if cursor < initial_bookmark {
                    continue;
                }
                max_bookmark = max_bookmark.max(cursor);
            }

            ctx.output.write_record(stream_id, &record)?;
            window_count += 1;
        }

        state.clear_export(stream_id);
        state.set_replication_value(stream_id, key, to_iso(&max_bookmark));
        ctx.persist(state)?;

        info!(
            %export_id,
            export_start = %to_iso(&export_start),
            export_end = %to_iso(&export_end),
            records = window_count,
            "Finished export window"
        );
        record_count += window_count;
        export_start = export_end;
    }

    Ok(record_count)
}
