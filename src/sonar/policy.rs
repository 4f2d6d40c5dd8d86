//! Sonar data classification policies

use crate::error::Result;
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};

pub async fn list_policy_analyzer_groups(client: &PolarisClient) -> Result<Value> {
    client
        .query_raw("sonar_policy_analyzer_groups", json!({}))
        .await
}

pub async fn list_policies(client: &PolarisClient) -> Result<Value> {
    client.query_raw("sonar_policies", json!({})).await
}
