//! Browsing and downloading files of fileset and VM snapshots

use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use crate::validation::{check_first, validate_id};
use serde_json::{json, Map, Value};

/// Files under `path` of a snapshot; the root directory when `path` is empty
pub async fn get_snapshot_files(
    client: &PolarisClient,
    snapshot_id: &str,
    path: Option<&str>,
    first: Option<i64>,
    after: Option<&str>,
    search_prefix: Option<&str>,
) -> Result<Value> {
    let snapshot_id = validate_id(Some(snapshot_id), "snapshot_id")?;

    let mut variables = Map::new();
    variables.insert("snapshotFid".to_string(), json!(snapshot_id));
    variables.insert("path".to_string(), json!(path.unwrap_or_default()));
    if let Some(first) = first {
        variables.insert("first".to_string(), json!(check_first(first)?));
    }
    if let Some(after) = after.filter(|a| !a.is_empty()) {
        variables.insert("after".to_string(), json!(after));
    }
    if let Some(prefix) = search_prefix.filter(|p| !p.is_empty()) {
        variables.insert("searchPrefix".to_string(), json!(prefix));
    }

    client
        .query_raw("gps_snapshot_files", Value::Object(variables))
        .await
}

/// Ask the cluster to prepare a download of `paths`
pub async fn request_download_snapshot_files(
    client: &PolarisClient,
    snapshot_id: &str,
    paths: &[String],
    delta_type_filter: Option<Vec<String>>,
    next_snapshot_fid: Option<&str>,
) -> Result<Value> {
    let snapshot_id = validate_id(Some(snapshot_id), "snapshot_id")?;
    let paths: Vec<&str> = paths.iter().map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
    if paths.is_empty() {
        return Err(PolarisError::validation("paths field is required."));
    }

    let variables = json!({
        "snapshotFid": snapshot_id,
        "paths": paths,
        "deltaTypeFilter": delta_type_filter,
        "nextSnapshotFid": next_snapshot_fid,
    });
    client.query_raw("gps_file_download", variables).await
}
