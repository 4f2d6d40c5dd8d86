//! Radar anomaly analysis

use crate::error::Result;
use crate::polaris::client::PolarisClient;
use crate::validation::validate_id;
use serde_json::{json, Value};

/// Status of the anomaly analysis behind an event series
pub async fn get_analysis_status(client: &PolarisClient, activity_series_id: &str, cluster_id: &str) -> Result<Value> {
    let variables = json!({
        "activitySeriesId": validate_id(Some(activity_series_id), "activity_series_id")?,
        "clusterUuid": validate_id(Some(cluster_id), "cluster_id")?,
    });
    client.query_raw("radar_analysis_status", variables).await
}
