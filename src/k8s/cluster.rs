//! Kubernetes clusters protected through a CDM cluster

use crate::error::{Result, ResultExt};
use crate::monitor::{self, MonitorOptions};
use crate::polaris::client::PolarisClient;
use crate::validation::validate_uuid;
use serde::Serialize;
use serde_json::{json, Value};

/// Inclusive node port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRange {
    pub port_min: u16,
    pub port_max: u16,
}

#[derive(Debug, Clone)]
pub struct K8sClusterSpec {
    /// CDM cluster of an ON_PREM Kubernetes cluster
    pub cdm_cluster_id: String,
    /// IPs or host names of the nodes
    pub host_list: Vec<String>,
    pub name: String,
    /// Node port of the ingress controller
    pub kupr_ingress_port: u16,
    /// Node ports dedicated to exports
    pub user_port_range: PortRange,
    pub rbs_port_range: PortRange,
    /// KuprClusterType
    pub cluster_type: String,
    /// Proxy for egress calls into Polaris
    pub proxy_url: Option<String>,
}

pub async fn create_k8s_cluster(client: &PolarisClient, spec: &K8sClusterSpec) -> Result<Value> {
    add_cluster(client, spec).await.operation("Failed to create cluster")
}

async fn add_cluster(client: &PolarisClient, spec: &K8sClusterSpec) -> Result<Value> {
    validate_uuid(&spec.cdm_cluster_id, "cdm_cluster_id")?;
    let cluster_type = client
        .check_enum(&spec.cluster_type, "kupr_cluster_type", "KuprClusterType")
        .await?;

    let variables = json!({
        "cdm_cluster_id": spec.cdm_cluster_id,
        "host_list": spec.host_list,
        "k8s_cluster_name": spec.name,
        "kupr_ingress_port": spec.kupr_ingress_port,
        "user_port_ranges": [spec.user_port_range],
        "rbs_port_ranges": [spec.rbs_port_range],
        "cluster_type": cluster_type,
        "proxy_url": spec.proxy_url,
    });
    client.query("k8s_add", variables).await
}

/// Refresh the resources of a cluster, waiting on the refresh job when asked
pub async fn refresh_k8s_cluster(client: &PolarisClient, kupr_cluster_id: &str, wait: bool) -> Result<Value> {
    refresh(client, kupr_cluster_id, wait)
        .await
        .operation("Failed to refresh k8s cluster")
}

async fn refresh(client: &PolarisClient, kupr_cluster_id: &str, wait: bool) -> Result<Value> {
    validate_uuid(kupr_cluster_id, "kupr_cluster_id")?;
    let response = client
        .query("k8s_refresh", json!({ "kupr_cluster_id": kupr_cluster_id }))
        .await?;
    if !wait {
        return Ok(response);
    }

    let Some(taskchain_id) = response.get("taskchainId").and_then(Value::as_str) else {
        return Ok(response);
    };
    let outcome = monitor::wait_for_task(client, taskchain_id, MonitorOptions::default()).await?;
    Ok(json!([outcome]))
}

pub async fn list_k8s_clusters(client: &PolarisClient) -> Result<Value> {
    client
        .query("k8s_list", json!({}))
        .await
        .operation("Failed to list k8s clusters")
}

pub async fn get_k8s_status(client: &PolarisClient, kupr_cluster_id: &str) -> Result<Value> {
    client
        .query("k8s_status", json!({ "kupr_cluster_id": kupr_cluster_id }))
        .await
        .operation("Failed to get k8s cluster status")
}
