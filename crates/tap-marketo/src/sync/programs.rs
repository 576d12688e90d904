//! Programs: one date-filtered query, paged by offset

use super::{at_or_after, bookmark_datetime, replication_key, write_schema};
use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::format::{format_values, to_iso};
use tap_common::{State, Stream};
use tracing::{debug, info, instrument};

pub const PROGRAMS_ENDPOINT: &str = "rest/asset/v1/programs.json";

/// Largest page the asset API returns
pub const PROGRAMS_PAGE_SIZE: u64 = 200;

/// Warning Marketo returns once the offset runs past the last program
pub const NO_ASSET_MSG: &str = "No assets found for the given search criteria.";

/// Sync the `programs` stream from its bookmark up to now
#[instrument(skip_all, fields(stream = %stream.tap_stream_id))]
pub async fn sync_programs(
    ctx: &mut SyncContext<'_>,
    state: &mut State,
    stream: &Stream,
) -> Result<u64> {
    let stream_id = stream.tap_stream_id.as_str();
    let key = replication_key(stream, "updatedAt");
    write_schema(ctx, stream)?;

    let start = bookmark_datetime(ctx, state, stream_id, key)?;
    let start_date = to_iso(&start);
    let end_date = to_iso(&ctx.clock.now());

    let mut offset = 0u64;
    let mut record_count = 0u64;

    loop {
        let params = [
            ("maxReturn", PROGRAMS_PAGE_SIZE.to_string()),
            ("offset", offset.to_string()),
            ("earliestUpdatedAt", start_date.clone()),
            ("latestUpdatedAt", end_date.clone()),
        ];
        let data = ctx.client.request(PROGRAMS_ENDPOINT, &params).await?;

        if data.warnings.iter().any(|w| w == NO_ASSET_MSG) {
            debug!(offset, "No more programs");
            break;
        }
        if data.result.is_empty() {
            break;
        }

        for row in &data.result {
            let row = row.as_object().ok_or_else(|| {
                SyncError::api("malformed_result", format!("program row is not an object: {}", row))
            })?;
            let record = format_values(stream, row)?;
            if at_or_after(&record, key, start)? {
                ctx.output.write_record(stream_id, &record)?;
                record_count += 1;
            }
        }

        offset += PROGRAMS_PAGE_SIZE;
    }

    state.set_replication_value(stream_id, key, end_date.as_str());
    ctx.persist(state)?;

    info!(record_count, bookmark = %end_date, "Finished programs");
    Ok(record_count)
}
