//! GCP projects
//!
//! Projects are added either from a service account key, in which case the
//! project is looked up through Cloud Resource Manager, or by hand from its
//! name, number and ID using the default service account.

pub mod resource_manager;

use crate::error::{PolarisError, Result};
use crate::monitor::{self, MonitorOptions};
use crate::polaris::client::PolarisClient;
use resource_manager::{is_permission_error, ResourceManager};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// How to identify a project when adding it
#[derive(Debug, Clone)]
pub enum GcpProjectSource {
    /// Covered by the default service account
    Manual { name: String, number: u64, id: String },
    /// Looked up with its own service account key
    KeyFile { path: PathBuf, project_id: Option<String> },
}

/// Variables of the add-project mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GcpProjectRecord {
    pub gcp_native_project_name: String,
    pub gcp_native_project_id: String,
    pub gcp_native_project_number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_auth_key: Option<String>,
}

/// Projects protected by Polaris whose name or number contains `filter`
pub async fn list_projects(client: &PolarisClient, filter: &str) -> Result<Value> {
    client.query("accounts_gcp", json!({ "filter": filter })).await
}

/// Cloud account records matching `search_text`
pub async fn find_projects(client: &PolarisClient, search_text: &str) -> Result<Value> {
    client
        .query(
            "accounts_gcp_projects",
            json!({ "search_text": search_text, "status_filters": [] }),
        )
        .await
}

/// Permissions Polaris needs on a protected project
pub async fn required_permissions(client: &PolarisClient) -> Result<Vec<String>> {
    let response = client.query("accounts_gcp_permissions", json!({})).await?;
    Ok(response
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|p| p.get("permission").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

pub async fn default_service_account(client: &PolarisClient) -> Result<Value> {
    client.query("accounts_gcp_default_sa_get", json!({})).await
}

/// Register a key file as the default service account
pub async fn set_default_service_account(
    client: &PolarisClient,
    key_file: &Path,
    name: Option<&str>,
) -> Result<Value> {
    let jwt_config = tokio::fs::read_to_string(key_file).await?;
    client
        .query(
            "accounts_gcp_default_sa_set",
            json!({ "name": name, "jwt_config": jwt_config }),
        )
        .await
}

/// Add a project to Polaris
pub async fn add_project(client: &PolarisClient, source: &GcpProjectSource) -> Result<Value> {
    let record = match source {
        GcpProjectSource::Manual { name, number, id } => {
            if name.is_empty() || id.is_empty() || *number == 0 {
                return Err(PolarisError::validation("Could not add GCP Project, please check inputs"));
            }
            GcpProjectRecord {
                gcp_native_project_name: name.clone(),
                gcp_native_project_id: id.clone(),
                gcp_native_project_number: *number,
                organization_name: None,
                service_account_auth_key: None,
            }
        }
        GcpProjectSource::KeyFile { path, project_id } => {
            native_project(client, path, project_id.as_deref()).await?
        }
    };

    let project_id = record.gcp_native_project_id.clone();
    let response = client
        .query("accounts_gcp_project_add", serde_json::to_value(&record)?)
        .await
        .map_err(|e| {
            tracing::error!("Adding GCP project {} failed: {}", project_id, e);
            PolarisError::validation(format!("Problem adding GCP Project to Polaris: {}", project_id))
        })?;

    if is_empty_result(&response) {
        return Err(PolarisError::validation(format!(
            "Problem adding GCP Project to Polaris: {}",
            project_id
        )));
    }
    tracing::info!("GCP project {} added", project_id);
    Ok(response)
}

/// Describe a project from GCP with the key of a service account that can protect it
pub async fn native_project(
    client: &PolarisClient,
    key_file: &Path,
    project_id: Option<&str>,
) -> Result<GcpProjectRecord> {
    let key = tokio::fs::read_to_string(key_file).await?;
    let project_id = match project_id.filter(|p| !p.is_empty()) {
        Some(id) => id.to_string(),
        None => key_project_id(&key)?,
    };

    let manager = ResourceManager::from_key_file(key_file)?;
    let required = required_permissions(client).await?;
    let granted = manager
        .test_iam_permissions(&project_id, &required)
        .await
        .map_err(|e| PolarisError::Gcp(format!("Failed to lookup SA permissions from GCP: {}", e)))?;
    let missing = missing_permissions(&required, &granted);
    if !missing.is_empty() {
        return Err(PolarisError::validation(format!(
            "Permissions are incorrect for Service Account. Requires additional: {:?}",
            missing
        )));
    }

    let project = manager.get_project(&project_id).await?;
    let organization_name = match project.pointer("/parent/type").and_then(Value::as_str) {
        Some("organization") => {
            let parent_id = project
                .pointer("/parent/id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match manager.get_organization(&parent_id).await {
                Ok(org) => org
                    .get("displayName")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or(Some(parent_id)),
                Err(e) if is_permission_error(&e) => {
                    tracing::warn!("No access to organization {}, using its ID", parent_id);
                    Some(parent_id)
                }
                Err(e) => return Err(e),
            }
        }
        _ => None,
    };

    project_record(&project, organization_name, key)
}

/// Build the add-project variables from a Resource Manager project
pub fn project_record(project: &Value, organization_name: Option<String>, key: String) -> Result<GcpProjectRecord> {
    let number = match project.get("projectNumber") {
        Some(Value::String(s)) => s.parse::<u64>().ok(),
        Some(Value::Number(n)) => n.as_u64(),
        _ => None,
    }
    .ok_or_else(|| PolarisError::Gcp("project has no projectNumber".to_string()))?;

    Ok(GcpProjectRecord {
        gcp_native_project_name: project
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        gcp_native_project_id: project
            .get("projectId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        gcp_native_project_number: number,
        organization_name,
        service_account_auth_key: Some(key),
    })
}

fn key_project_id(key: &str) -> Result<String> {
    let parsed: Value = serde_json::from_str(key)?;
    parsed
        .get("project_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PolarisError::validation("Could not add GCP Project, please check inputs"))
}

/// A mutation that answered nothing: a `null` root flattens to `[]`
fn is_empty_result(response: &Value) -> bool {
    match response {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Required permissions absent from `granted`
pub fn missing_permissions(required: &[String], granted: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|p| !granted.contains(p))
        .cloned()
        .collect()
}

/// Disable protection on a project if needed, then remove it from Polaris
pub async fn delete_project(client: &PolarisClient, project_id: &str, delete_snapshots: bool) -> Result<Value> {
    let records = find_projects(client, project_id).await?;
    let record = records
        .as_array()
        .and_then(|r| r.first())
        .ok_or_else(|| PolarisError::NotFound(format!("Project does not exist in Polaris : {}", project_id)))?;

    let status = record
        .pointer("/featureDetail/status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_uppercase();
    let rubrik_id = record
        .pointer("/project/id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if status == "CONNECTED" {
        disable_project(client, record, project_id, delete_snapshots).await?;
    } else if !status.contains("DISABLED") {
        return Err(PolarisError::validation(format!(
            "Project {} is {}, cannot delete",
            project_id, status
        )));
    }

    let response = client
        .query(
            "accounts_gcp_project_delete",
            json!({
                "native_protection_ids": [rubrik_id],
                "shared_vpc_host_project_ids": [],
                "cloud_account_project_ids": [],
            }),
        )
        .await?;
    tracing::info!("GCP project {} deleted", project_id);
    Ok(response)
}

async fn disable_project(
    client: &PolarisClient,
    record: &Value,
    project_id: &str,
    delete_snapshots: bool,
) -> Result<()> {
    let number = match record.pointer("/project/projectNumber") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let protected = list_projects(client, &number).await?;
    let native_id = protected
        .as_array()
        .and_then(|p| p.first())
        .and_then(|p| p.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| PolarisError::NotFound(format!("Project does not exist in Polaris : {}", project_id)))?;

    let response = client
        .query(
            "accounts_gcp_project_disable",
            json!({ "rubrik_project_id": native_id, "delete_snapshots": delete_snapshots }),
        )
        .await?;
    if is_empty_result(&response) {
        return Err(PolarisError::validation(format!(
            "Problem disabling protection on project: {}",
            project_id
        )));
    }

    let ids = monitor::taskchain_ids(&response);
    let outcomes = monitor::wait_for_tasks(client, &ids, MonitorOptions::default()).await?;
    if outcomes.is_empty() || !outcomes.iter().all(|o| o.state.contains("SUCC")) {
        return Err(PolarisError::validation(format!("Failed to disable project {}", project_id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_permissions() {
        let required = vec!["compute.disks.get".to_string(), "compute.instances.list".to_string()];
        let granted = vec!["compute.disks.get".to_string()];
        assert_eq!(missing_permissions(&required, &granted), vec!["compute.instances.list"]);
        assert!(missing_permissions(&required, &required).is_empty());
    }

    #[test]
    fn test_project_record_from_resource_manager() {
        let project = json!({
            "name": "Demo",
            "projectId": "demo-123",
            "projectNumber": "4455667788",
            "parent": {"type": "organization", "id": "99"}
        });
        let record = project_record(&project, Some("Acme".to_string()), "{}".to_string()).unwrap();
        assert_eq!(record.gcp_native_project_number, 4455667788);
        assert_eq!(record.gcp_native_project_id, "demo-123");

        let vars = serde_json::to_value(&record).unwrap();
        assert_eq!(vars["organization_name"], json!("Acme"));
        assert_eq!(vars["service_account_auth_key"], json!("{}"));
    }

    #[test]
    fn test_project_record_needs_number() {
        let err = project_record(&json!({"name": "x"}), None, String::new()).unwrap_err();
        assert!(matches!(err, PolarisError::Gcp(_)));
    }

    #[test]
    fn test_manual_record_skips_optional_fields() {
        let record = GcpProjectRecord {
            gcp_native_project_name: "p".to_string(),
            gcp_native_project_id: "p-1".to_string(),
            gcp_native_project_number: 1,
            organization_name: None,
            service_account_auth_key: None,
        };
        let vars = serde_json::to_value(&record).unwrap();
        assert!(vars.get("organization_name").is_none());
    }

    #[test]
    fn test_is_empty_result() {
        assert!(is_empty_result(&Value::Null));
        assert!(is_empty_result(&json!(false)));
        assert!(is_empty_result(&json!([])));
        assert!(is_empty_result(&json!({})));
        assert!(!is_empty_result(&json!(true)));
        assert!(!is_empty_result(&json!({"projectUuid": "p"})));
    }

    #[test]
    fn test_key_project_id() {
        assert_eq!(key_project_id(r#"{"project_id": "abc"}"#).unwrap(), "abc");
        assert!(key_project_id(r#"{"type": "service_account"}"#).is_err());
    }
}
