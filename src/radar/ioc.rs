//! Indicator of compromise (malware) scans

use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use serde_json::{json, Map, Value};

const MISSING_PARAMETERS_IN_SCAN_RESULT: &str = "scan_id and cluster_id fields are required.";

fn required(field: &str) -> PolarisError {
    PolarisError::validation(format!("{} field is required.", field))
}

/// A scan of some objects for indicators of compromise
#[derive(Debug, Clone, Default)]
pub struct IocScanRequest {
    pub cluster_id: String,
    pub object_ids: Vec<String>,
    /// IndicatorOfCompromiseInput objects
    pub indicators_of_compromise: Vec<Value>,
    pub scan_name: Option<String>,
    /// Stop scanning a snapshot for an indicator after this many matches
    pub max_matches_per_snapshot: Option<u64>,
    /// MalwareScanSnapshotLimitInput
    pub snapshot_scan_limit: Option<Value>,
    pub maximum_file_size_to_scan: Option<u64>,
    pub minimum_file_size_to_scan: Option<u64>,
    pub paths_to_include: Vec<String>,
    pub paths_to_exclude: Vec<String>,
    /// Exempted from the exclusions
    pub paths_to_exempt: Vec<String>,
    /// HashTypeEnum values
    pub requested_hash_types: Vec<String>,
}

impl IocScanRequest {
    /// StartMalwareScanInput without the hash type check
    fn input(&self) -> Result<Value> {
        if self.cluster_id.is_empty() {
            return Err(required("cluster_id"));
        }
        if self.object_ids.is_empty() {
            return Err(required("object_ids"));
        }
        if self.indicators_of_compromise.is_empty() {
            return Err(required("indicators_of_compromise"));
        }

        let mut config = Map::new();
        config.insert("objectIds".to_string(), json!(self.object_ids));
        config.insert(
            "indicatorsOfCompromise".to_string(),
            json!(self.indicators_of_compromise),
        );
        if let Some(name) = self.scan_name.as_deref().filter(|n| !n.is_empty()) {
            config.insert("name".to_string(), json!(name));
        }
        if let Some(limit) = &self.snapshot_scan_limit {
            config.insert("snapshotScanLimit".to_string(), limit.clone());
        }
        if let Some(max) = self.max_matches_per_snapshot {
            config.insert("maxMatchesPerSnapshot".to_string(), json!(max));
        }

        let mut path_filter = Map::new();
        for (key, paths) in [
            ("includes", &self.paths_to_include),
            ("excludes", &self.paths_to_exclude),
            ("exceptions", &self.paths_to_exempt),
        ] {
            if !paths.is_empty() {
                path_filter.insert(key.to_string(), json!(paths));
            }
        }

        let mut size_limits = Map::new();
        if let Some(max) = self.maximum_file_size_to_scan.filter(|s| *s > 0) {
            size_limits.insert("maximumSizeInBytes".to_string(), json!(max));
        }
        if let Some(min) = self.minimum_file_size_to_scan.filter(|s| *s > 0) {
            size_limits.insert("minimumSizeInBytes".to_string(), json!(min));
        }

        let mut criteria = Map::new();
        if !path_filter.is_empty() {
            criteria.insert("pathFilter".to_string(), Value::Object(path_filter));
        }
        if !size_limits.is_empty() {
            criteria.insert("fileSizeLimits".to_string(), Value::Object(size_limits));
        }
        if !criteria.is_empty() {
            config.insert("fileScanCriteria".to_string(), Value::Object(criteria));
        }
        if !self.requested_hash_types.is_empty() {
            config.insert(
                "requestedMatchDetails".to_string(),
                json!({ "requestedHashTypes": self.requested_hash_types }),
            );
        }

        Ok(json!({
            "clusterUuid": self.cluster_id,
            "malwareScanConfig": config,
        }))
    }
}

pub async fn trigger_ioc_scan(client: &PolarisClient, request: &IocScanRequest) -> Result<Value> {
    let input = request.input()?;
    if !request.requested_hash_types.is_empty() {
        client
            .check_enum_list(&request.requested_hash_types, "requested_hash_types", "HashTypeEnum")
            .await?;
    }
    tracing::info!(
        "Starting IOC scan of {} object(s) on cluster {}",
        request.object_ids.len(),
        request.cluster_id
    );
    client.query_raw("radar_ioc_scan", json!({ "input": input })).await
}

pub async fn get_ioc_scan_list(client: &PolarisClient, cluster_id: &str) -> Result<Value> {
    if cluster_id.is_empty() {
        return Err(required("cluster_id"));
    }
    client
        .query_raw(
            "radar_ioc_scan_list",
            json!({ "input": { "clusterUuid": cluster_id } }),
        )
        .await
}

pub async fn get_ioc_scan_result(client: &PolarisClient, scan_id: &str, cluster_id: &str) -> Result<Value> {
    if scan_id.is_empty() || cluster_id.is_empty() {
        return Err(PolarisError::validation(MISSING_PARAMETERS_IN_SCAN_RESULT));
    }
    client
        .query_raw(
            "radar_ioc_scan_result",
            json!({ "input": { "id": scan_id, "clusterUuid": cluster_id } }),
        )
        .await
}
