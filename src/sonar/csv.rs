//! Sonar CSV exports

use super::check_file_type;
use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};

const MISSING_PARAMETERS_IN_CSV_DOWNLOAD: &str = "snapshot_id and snappable_id(object ID) fields are required.";

/// Ask Polaris to build the CSV of the results of a snapshot
///
/// `filters` is a ListFileResultFiltersInput; pass `Value::Null` for none.
pub async fn get_csv_download(
    client: &PolarisClient,
    snapshot_id: &str,
    snappable_id: &str,
    filters: Value,
) -> Result<Value> {
    if snapshot_id.is_empty() || snappable_id.is_empty() {
        return Err(PolarisError::validation(MISSING_PARAMETERS_IN_CSV_DOWNLOAD));
    }
    check_file_type(client, &filters, false).await?;

    client
        .query_raw(
            "sonar_csv_download",
            json!({
                "filters": filters,
                "snapshotFid": snapshot_id,
                "snappableFid": snappable_id,
            }),
        )
        .await
}

/// Download link of a CSV built by [`get_csv_download`]
pub async fn get_csv_result_download(client: &PolarisClient, download_id: i64) -> Result<Value> {
    if download_id <= 0 {
        return Err(PolarisError::validation("download_id field is required."));
    }
    client
        .query_raw("sonar_csv_result_download", json!({ "downloadId": download_id }))
        .await
}
