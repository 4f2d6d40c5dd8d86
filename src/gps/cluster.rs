//! CDM clusters as seen by the global protection service

use crate::common::PageArgs;
use crate::error::Result;
use crate::polaris::client::PolarisClient;
use serde_json::{json, Map, Value};

/// Every cluster matching `filter` (ClusterFilterInput), all pages merged
pub async fn list_clusters(client: &PolarisClient, filter: Value, page: &PageArgs) -> Result<Value> {
    let mut variables = Map::new();
    variables.insert(
        "filter".to_string(),
        if filter.is_null() { json!({}) } else { filter },
    );
    page.apply(client, &mut variables, "ClusterSortByEnum", "SortOrder")
        .await?;
    client
        .query_paginated("gps_clusters", Value::Object(variables))
        .await
}
