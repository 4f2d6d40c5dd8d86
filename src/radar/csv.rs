//! Radar CSV results

use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};

const MISSING_PARAMETERS_IN_CSV_RESULT: &str =
    "cluster_id, snapshot_id and snappable_id(object ID) fields are required.";

/// Download link of the analysed files of a snapshot
pub async fn get_csv_result(
    client: &PolarisClient,
    cluster_id: &str,
    snapshot_id: &str,
    snappable_id: &str,
) -> Result<Value> {
    if cluster_id.is_empty() || snapshot_id.is_empty() || snappable_id.is_empty() {
        return Err(PolarisError::validation(MISSING_PARAMETERS_IN_CSV_RESULT));
    }
    client
        .query_raw(
            "radar_anomaly_csv_analysis",
            json!({
                "clusterUuid": cluster_id,
                "snapshotId": snapshot_id,
                "snappableIdNotFid": snappable_id,
            }),
        )
        .await
}
