//! Azure subscriptions

use crate::error::Result;
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};

/// Azure subscriptions whose name contains `filter`
pub async fn list_subscriptions(client: &PolarisClient, filter: &str) -> Result<Value> {
    client.query("accounts_azure", json!({ "filter": filter })).await
}
