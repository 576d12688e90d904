//! Activity types: a single unpaged snapshot

use super::write_schema;
use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::format::format_values;
use tap_common::{State, Stream};
use tracing::{info, instrument};

pub const ACTIVITY_TYPES_ENDPOINT: &str = "rest/v1/activities/types.json";

/// Emit every activity type; no bookmark is kept
#[instrument(skip_all, fields(stream = %stream.tap_stream_id))]
pub async fn sync_activity_types(
    ctx: &mut SyncContext<'_>,
    _state: &mut State,
    stream: &Stream,
) -> Result<u64> {
    let stream_id = stream.tap_stream_id.as_str();
    write_schema(ctx, stream)?;

    let data = ctx
        .client
        .request(ACTIVITY_TYPES_ENDPOINT, &[])
        .await?;

    let mut record_count = 0u64;
    for row in &data.result {
        let row = row.as_object().ok_or_else(|| {
            SyncError::api("malformed_result", format!("activity type is not an object: {}", row))
        })?;
        let record = format_values(stream, row)?;
        ctx.output.write_record(stream_id, &record)?;
        record_count += 1;
    }

    info!(record_count, "Finished activity types");
    Ok(record_count)
}
