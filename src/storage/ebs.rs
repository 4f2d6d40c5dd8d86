//! AWS EBS volumes

use crate::compute::{select_ids, ObjectCriteria};
use crate::error::Result;
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};

pub async fn list_volumes(client: &PolarisClient) -> Result<Value> {
    client.query("storage_aws_ebs", json!({})).await
}

/// IDs of the volumes matching `criteria`, tags included
pub async fn object_ids(client: &PolarisClient, criteria: &ObjectCriteria) -> Result<Vec<String>> {
    Ok(select_ids(&list_volumes(client).await?, criteria, "tags"))
}
