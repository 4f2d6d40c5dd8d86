//! Kubernetes namespaces

use crate::error::{Result, ResultExt};
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};

/// Namespaces of every cluster; `filter` is a list of Filter objects
pub async fn get_k8s_namespaces(client: &PolarisClient, filter: &[Value]) -> Result<Value> {
    let variables = if filter.is_empty() {
        json!({})
    } else {
        json!({ "filter": filter })
    };
    client
        .query("k8s_namespaces", variables)
        .await
        .operation("Failed to get k8s namespaces")
}

pub async fn get_k8s_namespace(client: &PolarisClient, polaris_id: &str) -> Result<Value> {
    client
        .query("k8s_namespace", json!({ "polaris_id": polaris_id }))
        .await
        .operation("Failed to get k8s namespace")
}
