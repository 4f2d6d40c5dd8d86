//! vSphere virtual machines: live mounts, on-demand snapshots, exports and file recovery
//!
//! These calls start asynchronous requests on the cluster; follow them up
//! with [`get_async_request_result`].

use crate::common::PageArgs;
use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use crate::validation::validate_id;
use serde_json::{json, Map, Value};

const REQUIRED_KEYS_IN_CONFIG: &str =
    "Config field should contain datastoreId, hostId or clusterId and snapshotId.";

fn required(field: &str) -> PolarisError {
    PolarisError::validation(format!("{} field is required.", field))
}

#[derive(Debug, Clone, Default)]
pub struct LiveMountOptions {
    pub host_id: Option<String>,
    pub vm_name: Option<String>,
    pub datastore_name: Option<String>,
    pub disable_network: bool,
    pub remove_network_devices: bool,
    pub power_on: bool,
    pub keep_mac_addresses: bool,
    pub create_datastore_only: bool,
    pub vlan: Option<i64>,
    pub should_recover_tags: bool,
}

impl LiveMountOptions {
    fn variables(&self, snapshot_fid: &str) -> Value {
        let mut variables = Map::new();
        variables.insert("snapshotFid".to_string(), json!(snapshot_fid));
        variables.insert("hostID".to_string(), json!(self.host_id));
        variables.insert("vmName".to_string(), json!(self.vm_name));
        variables.insert("datastoreName".to_string(), json!(self.datastore_name));

        let flags = [
            ("disableNetwork", self.disable_network),
            ("removeNetworkDevices", self.remove_network_devices),
            ("powerOn", self.power_on),
            ("keepMacAddresses", self.keep_mac_addresses),
            ("createDatastoreOnly", self.create_datastore_only),
            ("shouldRecoverTags", self.should_recover_tags),
        ];
        for (key, set) in flags {
            if set {
                variables.insert(key.to_string(), json!(true));
            }
        }
        if let Some(vlan) = self.vlan {
            variables.insert("vlan".to_string(), json!(vlan));
        }
        Value::Object(variables)
    }
}

/// Live mount a VM snapshot
pub async fn create_vm_livemount(
    client: &PolarisClient,
    snapshot_fid: &str,
    options: &LiveMountOptions,
) -> Result<Value> {
    let snapshot_fid = validate_id(Some(snapshot_fid), "snapshot_fid")?;
    client
        .query_raw("gps_vm_livemount", options.variables(snapshot_fid))
        .await
}

/// On-demand snapshot of a VM, optionally under another SLA domain
pub async fn create_vm_snapshot(client: &PolarisClient, snappable_id: &str, sla_id: Option<&str>) -> Result<Value> {
    let snappable_id = validate_id(Some(snappable_id), "snapshot_id")?;
    let mut variables = json!({ "snappableId": snappable_id });
    if let Some(sla_id) = sla_id.map(str::trim).filter(|s| !s.is_empty()) {
        variables["slaID"] = json!(sla_id);
    }
    client.query_raw("gps_vm_snapshot_create", variables).await
}

/// One page of vSphere hosts
pub async fn list_vsphere_hosts(client: &PolarisClient, filters: &[Value], page: &PageArgs) -> Result<Value> {
    let mut variables = Map::new();
    page.apply(client, &mut variables, "HierarchySortByField", "HierarchySortOrder")
        .await?;
    if !filters.is_empty() {
        variables.insert("filter".to_string(), json!(filters));
    }
    client.query_raw("gps_vm_hosts", Value::Object(variables)).await
}

/// One page of the datastores of a vSphere host
pub async fn list_vsphere_datastores(
    client: &PolarisClient,
    host_id: &str,
    filters: &[Value],
    page: &PageArgs,
) -> Result<Value> {
    let host_id = validate_id(Some(host_id), "host_id")?;
    let mut variables = Map::new();
    variables.insert("hostId".to_string(), json!(host_id));
    page.apply(client, &mut variables, "HierarchySortByField", "HierarchySortOrder")
        .await?;
    if !filters.is_empty() {
        variables.insert("filter".to_string(), json!(filters));
    }
    client.query_raw("gps_vm_datastores", Value::Object(variables)).await
}

/// Export a VM snapshot as a new VM
///
/// `config` is an ExportSnapshotJobConfigV2Input.
pub async fn export_vm_snapshot(client: &PolarisClient, object_id: &str, config: &Value) -> Result<Value> {
    let object_id = validate_id(Some(object_id), "id_")?;
    check_export_config(config)?;
    client
        .query_raw("gps_vm_export", json!({ "id": object_id, "config": config }))
        .await
}

pub fn check_export_config(config: &Value) -> Result<()> {
    let config = match config {
        Value::Null => return Err(required("config")),
        Value::Object(map) if map.is_empty() => return Err(required("config")),
        Value::Object(map) => map,
        other => {
            return Err(PolarisError::validation(format!(
                "'{}' is an invalid value for field config.",
                other
            )))
        }
    };

    let present = |value: Option<&Value>| value.and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    let datastore = present(config.get("datastoreId"));
    let placement = present(config.get("hostId")) || present(config.get("clusterId"));
    let snapshot = present(
        config
            .get("requiredRecoveryParameters")
            .and_then(|p| p.get("snapshotId")),
    );

    if !datastore || !placement || !snapshot {
        return Err(PolarisError::validation(REQUIRED_KEYS_IN_CONFIG));
    }
    Ok(())
}

/// Status of a request started by one of the calls above
pub async fn get_async_request_result(client: &PolarisClient, request_id: &str, cluster_id: &str) -> Result<Value> {
    if request_id.is_empty() {
        return Err(required("request_id"));
    }
    if cluster_id.is_empty() {
        return Err(required("cluster_id"));
    }
    client
        .query_raw(
            "gps_async_request_result",
            json!({ "id": request_id, "clusterUuid": cluster_id }),
        )
        .await
}

#[derive(Debug, Clone, Default)]
pub struct FileRecoveryOptions {
    /// Defaults to the object of the snapshot
    pub destination_object_id: Option<String>,
    pub should_use_agent: bool,
    pub should_restore_x_attrs: bool,
    pub ignore_errors: bool,
}

/// Recover files of a snapshot; `restore_config` holds RestorePathPairInput objects
pub async fn recover_files(
    client: &PolarisClient,
    snapshot_id: &str,
    cluster_id: &str,
    restore_config: &[Value],
    options: &FileRecoveryOptions,
) -> Result<Value> {
    let snapshot_id = validate_id(Some(snapshot_id), "snapshot_id")?;
    let cluster_id = validate_id(Some(cluster_id), "cluster_id")?;
    let config = recovery_config(restore_config, options)?;

    client
        .query_raw(
            "gps_vm_files_recover",
            json!({ "id": snapshot_id, "clusterUuid": cluster_id, "config": config }),
        )
        .await
}

fn recovery_config(restore_config: &[Value], options: &FileRecoveryOptions) -> Result<Value> {
    if restore_config.is_empty() {
        return Err(required("restore_config"));
    }

    let mut config = Map::new();
    if let Some(dest) = options.destination_object_id.as_deref().filter(|d| !d.is_empty()) {
        config.insert("destObjectId".to_string(), json!(dest));
    }
    if options.should_use_agent {
        config.insert("shouldUseAgent".to_string(), json!(true));
    }
    if options.should_restore_x_attrs {
        config.insert("shouldRestoreXAttrs".to_string(), json!(true));
    }
    if options.ignore_errors {
        config.insert("ignoreErrors".to_string(), json!(true));
    }
    config.insert(
        "restoreConfig".to_string(),
        restore_config
            .iter()
            .map(|pair| json!({ "restorePathPair": pair }))
            .collect(),
    );
    Ok(Value::Object(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_config_keys() {
        let full = json!({
            "datastoreId": "ds",
            "hostId": "h",
            "requiredRecoveryParameters": {"snapshotId": "s"}
        });
        assert!(check_export_config(&full).is_ok());

        let cluster = json!({
            "datastoreId": "ds",
            "clusterId": "c",
            "requiredRecoveryParameters": {"snapshotId": "s"}
        });
        assert!(check_export_config(&cluster).is_ok());

        let no_snapshot = json!({"datastoreId": "ds", "hostId": "h"});
        assert_eq!(
            check_export_config(&no_snapshot).unwrap_err().to_string(),
            REQUIRED_KEYS_IN_CONFIG
        );
    }

    #[test]
    fn test_export_config_shape() {
        assert_eq!(
            check_export_config(&json!({})).unwrap_err().to_string(),
            "config field is required."
        );
        assert!(check_export_config(&json!("x"))
            .unwrap_err()
            .to_string()
            .ends_with("is an invalid value for field config."));
    }

    #[test]
    fn test_livemount_flags_only_when_set() {
        let options = LiveMountOptions {
            power_on: true,
            vlan: Some(12),
            ..Default::default()
        };
        let vars = options.variables("snap");
        assert_eq!(vars["powerOn"], json!(true));
        assert_eq!(vars["vlan"], json!(12));
        assert!(vars.get("disableNetwork").is_none());
        assert_eq!(vars["hostID"], Value::Null);
    }

    #[test]
    fn test_recovery_config() {
        let pairs = vec![json!({"path": "/etc/hosts", "restorePath": "/tmp"})];
        let options = FileRecoveryOptions {
            ignore_errors: true,
            ..Default::default()
        };
        let config = recovery_config(&pairs, &options).unwrap();
        assert_eq!(config["restoreConfig"][0]["restorePathPair"]["path"], json!("/etc/hosts"));
        assert_eq!(config["ignoreErrors"], json!(true));
        assert!(config.get("shouldUseAgent").is_none());

        assert_eq!(
            recovery_config(&[], &options).unwrap_err().to_string(),
            "restore_config field is required."
        );
    }
}
