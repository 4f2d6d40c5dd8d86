//! Objects (virtual machines, filesets...) and their snapshots

use super::{non_empty, PageArgs};
use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use crate::validation::{require_date_pair, require_sort_pair, split_csv, validate_id};
use serde_json::{json, Map, Value};

const MISSING_PARAMETERS_IN_SNAPSHOT: &str = "object_id, snapshot_group_by, missed_snapshot_group_by, time_range, \
     timezone_offset, and cluster_connected fields are required.";

async fn hierarchy_page(
    client: &PolarisClient,
    query_name: &str,
    filters: &[Value],
    page: &PageArgs,
) -> Result<Value> {
    require_sort_pair(page.sort_by.as_deref(), page.sort_order.as_deref())?;

    let mut variables = Map::new();
    variables.insert("filter".to_string(), json!(filters));
    page.apply(client, &mut variables, "HierarchySortByField", "HierarchySortOrder")
        .await?;
    client.query_raw(query_name, Value::Object(variables)).await
}

/// One page of vSphere virtual machines
pub async fn list_vm_objects(client: &PolarisClient, filters: &[Value], page: &PageArgs) -> Result<Value> {
    hierarchy_page(client, "polaris_vm_object_list", filters, page).await
}

/// Global search across every object type
pub async fn search_object(client: &PolarisClient, filters: &[Value], page: &PageArgs) -> Result<Value> {
    hierarchy_page(client, "polaris_object_search", filters, page).await
}

pub async fn get_object_metadata(client: &PolarisClient, object_id: &str) -> Result<Value> {
    let object_id = validate_id(Some(object_id), "object_id")?;
    client
        .query_raw("polaris_vm_object_metadata", json!({ "id": object_id }))
        .await
}

/// Arguments of [`get_object_snapshot`]
#[derive(Debug, Clone)]
pub struct ObjectSnapshotQuery {
    pub object_id: String,
    /// `Month`, `Day`, `Year`, `Week`, `Hour` or `Quarter`
    pub snapshot_group_by: String,
    pub missed_snapshot_group_by: String,
    /// `{"start": ..., "end": ...}`
    pub time_range: Value,
    /// Hours from UTC, e.g. `5.5`
    pub timezone_offset: f64,
    pub cluster_connected: bool,
}

/// Snapshots and missed snapshots of an object, grouped over a time range
pub async fn get_object_snapshot(client: &PolarisClient, query: &ObjectSnapshotQuery) -> Result<Value> {
    let time_range_empty = match &query.time_range {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if query.object_id.is_empty()
        || query.snapshot_group_by.is_empty()
        || query.missed_snapshot_group_by.is_empty()
        || time_range_empty
    {
        return Err(PolarisError::validation(MISSING_PARAMETERS_IN_SNAPSHOT));
    }
    if !query.timezone_offset.is_finite() {
        return Err(PolarisError::validation(format!(
            "'{}' is an invalid value for 'timezone_offset'. Value must be of type float.",
            query.timezone_offset
        )));
    }

    let snapshot_group_by = client
        .check_enum(&query.snapshot_group_by, "snapshot_group_by", "CdmSnapshotGroupByEnum")
        .await?;
    let missed_snapshot_group_by = client
        .check_enum(
            &query.missed_snapshot_group_by,
            "missed_snapshot_group_by",
            "MissedSnapshotGroupByEnum",
        )
        .await?;

    let variables = json!({
        "id": query.object_id,
        "snapshotGroupBy": snapshot_group_by,
        "missedSnapshotGroupBy": missed_snapshot_group_by,
        "timeRange": query.time_range,
        "timezoneOffset": query.timezone_offset,
        "clusterConnected": query.cluster_connected,
    });
    client.query_raw("polaris_vm_object_snapshot", variables).await
}

/// One page of objects of any hierarchy type
///
/// `type_filter` takes comma separated HierarchyObjectTypeEnum values.
pub async fn list_objects(
    client: &PolarisClient,
    type_filter: Option<&str>,
    filters: &[Value],
    page: &PageArgs,
) -> Result<Value> {
    let mut variables = Map::new();
    page.apply(client, &mut variables, "HierarchySortByField", "HierarchySortOrder")
        .await?;

    if !filters.is_empty() {
        variables.insert("filter".to_string(), json!(filters));
    }
    if let Some(types) = type_filter.filter(|t| !t.is_empty()) {
        let types = client
            .check_enum_list(&split_csv(types), "type_filter", "HierarchyObjectTypeEnum")
            .await?;
        if !types.is_empty() {
            variables.insert("typeFilter".to_string(), json!(types));
        }
    }

    client.query_raw("polaris_object_list", Value::Object(variables)).await
}

/// Arguments of [`list_object_snapshots`]
#[derive(Debug, Clone, Default)]
pub struct SnapshotListQuery {
    pub object_id: String,
    pub snapshot_filter: Vec<Value>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: PageArgs,
}

/// One page of snapshots of an object
pub async fn list_object_snapshots(client: &PolarisClient, query: &SnapshotListQuery) -> Result<Value> {
    require_date_pair(query.start_date.as_deref(), query.end_date.as_deref())?;

    let mut variables = Map::new();
    query
        .page
        .apply(client, &mut variables, "SnapshotQuerySortByField", "SortOrderEnum")
        .await?;
    variables.insert("snappableId".to_string(), json!(query.object_id));

    if !query.snapshot_filter.is_empty() {
        variables.insert("snapshotFilter".to_string(), json!(query.snapshot_filter));
    }
    if let (Some(start), Some(end)) = (non_empty(&query.start_date), non_empty(&query.end_date)) {
        variables.insert("timeRange".to_string(), json!({ "start": start, "end": end }));
    }

    client
        .query_raw("polaris_object_snapshot", Value::Object(variables))
        .await
}
