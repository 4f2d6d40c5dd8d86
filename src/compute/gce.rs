//! GCE instances

use super::{select_ids, submit_restore, ObjectCriteria, RestoreOptions};
use crate::error::Result;
use crate::monitor::Submission;
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};

pub async fn list_instances(client: &PolarisClient) -> Result<Value> {
    client.query("compute_gcp_gce", json!({})).await
}

/// IDs of the instances matching `criteria`; tags match GCE labels
pub async fn object_ids(client: &PolarisClient, criteria: &ObjectCriteria) -> Result<Vec<String>> {
    Ok(select_ids(&list_instances(client).await?, criteria, "labels"))
}

/// `should_restore_tags` restores labels
pub async fn restore(client: &PolarisClient, snapshot_id: &str, options: &RestoreOptions) -> Result<Submission> {
    submit_restore(client, "compute_restore_gce", snapshot_id, options).await
}
