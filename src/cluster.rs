//! CDM clusters registered with Polaris

use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};

pub const NO_LOCATION: &str = "No Location Configured";

async fn cluster_node(client: &PolarisClient, query_name: &str, cluster_id: &str) -> Result<Value> {
    let result = client
        .query(query_name, json!({ "filter": { "id": [cluster_id] } }))
        .await?;
    first_node(&result)
        .cloned()
        .ok_or_else(|| PolarisError::NotFound(format!("A CDM Cluster with an ID of {} was not found.", cluster_id)))
}

fn first_node(result: &Value) -> Option<&Value> {
    result.get("nodes")?.as_array()?.first()
}

/// Configured address of a cluster, or [`NO_LOCATION`]
pub async fn get_cdm_cluster_location(client: &PolarisClient, cluster_id: &str) -> Result<String> {
    let node = cluster_node(client, "cdm_cluster_location", cluster_id).await?;
    Ok(location(&node))
}

fn location(node: &Value) -> String {
    node.pointer("/geoLocation/address")
        .and_then(Value::as_str)
        .unwrap_or(NO_LOCATION)
        .to_string()
}

pub async fn get_cdm_cluster_connection_status(client: &PolarisClient, cluster_id: &str) -> Result<String> {
    let node = cluster_node(client, "cdm_cluster_connection_status", cluster_id).await?;
    Ok(connected_state(&node).to_string())
}

fn connected_state(node: &Value) -> &str {
    node.pointer("/state/connectedState")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// IP address of the first node of a connected cluster
pub async fn get_cdm_cluster_ipaddr(client: &PolarisClient, cluster_id: &str) -> Result<String> {
    let node = cluster_node(client, "cdm_cluster_ipaddr", cluster_id).await?;
    ipaddr(&node, cluster_id)
}

fn ipaddr(node: &Value, cluster_id: &str) -> Result<String> {
    if connected_state(node) != "Connected" {
        return Err(PolarisError::validation(format!(
            "Cluster with ID {} is not connected.",
            cluster_id
        )));
    }
    node.pointer("/clusterNodeConnection/nodes/0/ipAddress")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PolarisError::NotFound(format!("Cluster with ID {} has no nodes.", cluster_id)))
}
