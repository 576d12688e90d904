//! Activities: windowed bulk export, one stream per activity type

use super::{bookmark_datetime, replication_key, write_schema};
use crate::activity::flatten_activity;
use crate::api::ExportKind;
use crate::context::SyncContext;
use crate::error::Result;
use crate::export::{get_or_create_export, stream_rows, wait_for_export};
use crate::format::{format_values, to_iso};
use chrono::SubsecRound;
use tap_common::{State, Stream};
use tracing::{info, instrument};

/// Sync one `activities_*` stream; the bookmark advances to each window's end
#[instrument(skip_all, fields(stream = %stream.tap_stream_id))]
pub async fn sync_activities(
    ctx: &mut SyncContext<'_>,
    state: &mut State,
    stream: &Stream,
) -> Result<u64> {
    let stream_id = stream.tap_stream_id.as_str();
    let key = replication_key(stream, "activityDate");
    write_schema(ctx, stream)?;

    let mut export_start = bookmark_datetime(ctx, state, stream_id, key)?;
    let job_started = ctx.clock.now().trunc_subsecs(0);
    let mut record_count = 0u64;

    while export_start < job_started {
        let (export_id, export_end) =
            get_or_create_export(ctx, state, stream, ExportKind::Activities, export_start).await?;
        wait_for_export(ctx, state, stream, ExportKind::Activities, &export_id).await?;

        let mut window_count = 0u64;
        for row in stream_rows(ctx.client, ExportKind::Activities, &export_id).await? {
            let flat = flatten_activity(&row?, stream)?;
            let record = format_values(stream, &flat)?;
            ctx.output.write_record(stream_id, &record)?;
            window_count += 1;
        }

        state.clear_export(stream_id);
        state.set_replication_value(stream_id, key, to_iso(&export_end));
        ctx.persist(state)?;

        info!(
            %export_id,
            export_end = %to_iso(&export_end),
            records = window_count,
            "Finished export window"
        );
        record_count += window_count;
        export_start = export_end;
    }

    Ok(record_count)
}
