//! Azure virtual machines

use super::{select_ids, submit_restore, ObjectCriteria, RestoreOptions};
use crate::error::Result;
use crate::monitor::Submission;
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};

pub async fn list_instances(client: &PolarisClient) -> Result<Value> {
    client.query("compute_azure_iaas", json!({})).await
}

pub async fn object_ids(client: &PolarisClient, criteria: &ObjectCriteria) -> Result<Vec<String>> {
    Ok(select_ids(&list_instances(client).await?, criteria, "tags"))
}

pub async fn restore(client: &PolarisClient, snapshot_id: &str, options: &RestoreOptions) -> Result<Submission> {
    submit_restore(client, "compute_restore_azure", snapshot_id, options).await
}
