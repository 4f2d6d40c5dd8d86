//! On-demand scans (crawls)

use super::check_file_type;
use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};

/// Scan `resources` (ResourceInput objects) with the given analyzer groups
pub async fn trigger_on_demand_scan(
    client: &PolarisClient,
    scan_name: &str,
    resources: &[Value],
    analyzer_groups: &[Value],
) -> Result<Value> {
    if scan_name.is_empty() || resources.is_empty() || analyzer_groups.is_empty() {
        return Err(PolarisError::validation(
            "scan_name, resources, and analyzer_groups fields are required.",
        ));
    }
    client
        .query_raw(
            "sonar_on_demand_scan",
            json!({
                "crawlName": scan_name,
                "resources": resources,
                "analyzerGroups": analyzer_groups,
            }),
        )
        .await
}

pub async fn get_on_demand_scan_status(client: &PolarisClient, crawl_id: &str) -> Result<Value> {
    if crawl_id.is_empty() {
        return Err(PolarisError::validation("crawl_id field is required."));
    }
    client
        .query_raw("sonar_on_demand_scan_status", json!({ "crawlId": crawl_id }))
        .await
}

/// Download link of the scanned files of one file type
pub async fn get_on_demand_scan_result(client: &PolarisClient, crawl_id: &str, filters: Value) -> Result<Value> {
    let empty = match &filters {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if crawl_id.is_empty() || empty {
        return Err(PolarisError::validation("crawl_id and filters fields are required."));
    }
    check_file_type(client, &filters, true).await?;

    client
        .query_raw(
            "sonar_on_demand_scan_result",
            json!({ "crawlId": crawl_id, "filter": filters }),
        )
        .await
}
