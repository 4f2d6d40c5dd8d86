//! vSphere virtual machines

use super::{select_ids, ObjectCriteria};
use crate::error::Result;
use crate::polaris::client::PolarisClient;
use crate::validation::validate_id;
use serde_json::{json, Value};

const PAGE_SIZE: i64 = 500;

pub async fn list_vms(client: &PolarisClient) -> Result<Value> {
    client
        .query(
            "compute_vmware_vsphere",
            json!({ "filter": [], "first": PAGE_SIZE }),
        )
        .await
}

pub async fn get_vm(client: &PolarisClient, object_id: &str) -> Result<Value> {
    let object_id = validate_id(Some(object_id), "object_id")?;
    client
        .query("compute_vmware_vsphere_detail", json!({ "object_id": object_id }))
        .await
}

/// IDs of the VMs matching `criteria` on top-level fields
pub async fn object_ids(client: &PolarisClient, criteria: &ObjectCriteria) -> Result<Vec<String>> {
    Ok(select_ids(&list_vms(client).await?, criteria, "tags"))
}
