//! SLA domains, snapshots, task chains, events and reports

use super::{non_empty, PageArgs};
use crate::error::{PolarisError, Result};
use crate::monitor::{self, MonitorOptions, Submission};
use crate::polaris::client::PolarisClient;
use crate::validation::{check_first, split_csv};
use chrono::{DateTime, Local, Utc};
use serde_json::{json, Map, Value};

pub use crate::monitor::get_task_status;

/// SLA domains; a single domain when `name` matches one exactly
pub async fn get_sla_domains(client: &PolarisClient, name: Option<&str>) -> Result<Value> {
    let name = name.unwrap_or_default();
    let domains = client
        .query(
            "core_sla_list",
            json!({ "filter": [{ "field": "NAME", "text": name }] }),
        )
        .await?;

    if !name.is_empty() {
        if let Some(found) = domains
            .as_array()
            .and_then(|items| items.iter().find(|d| d.get("name").and_then(Value::as_str) == Some(name)))
        {
            return Ok(found.clone());
        }
    }
    Ok(domains)
}

/// Take on-demand snapshots of objects under an SLA domain
pub async fn submit_on_demand(
    client: &PolarisClient,
    object_ids: &[String],
    sla_id: &str,
    wait: bool,
) -> Result<Submission> {
    let response = client
        .query(
            "core_snappable_on_demand",
            json!({ "objectIds": object_ids, "slaId": sla_id }),
        )
        .await?;
    tracing::info!("On-demand snapshot requested for {} object(s)", object_ids.len());

    let errors: Vec<&Value> = response
        .get("errors")
        .and_then(Value::as_array)
        .map(|e| e.iter().collect())
        .unwrap_or_default();
    let ids = monitor::taskchain_ids(&response);

    if ids.is_empty() && !errors.is_empty() {
        let messages: Vec<String> = errors
            .iter()
            .map(|e| e.get("error").and_then(Value::as_str).unwrap_or("unknown error").to_string())
            .collect();
        return Ok(Submission::Rejected(messages.join("; ")));
    }
    if !wait {
        return Ok(Submission::Submitted(response));
    }
    Ok(Submission::Completed(
        monitor::wait_for_tasks(client, &ids, MonitorOptions::default()).await?,
    ))
}

/// How objects are (un)assigned to an SLA domain
#[derive(Debug, Clone)]
pub struct SlaAssignment {
    pub object_ids: Vec<String>,
    pub sla_id: Option<String>,
    /// `protectWithSlaId`, `doNotProtect` or `noAssignment`
    pub assign_type: String,
    pub apply_to_existing_snapshots: Option<bool>,
    /// `RETAIN_SNAPSHOTS`, `KEEP_FOREVER` or `EXPIRE_IMMEDIATELY`
    pub existing_snapshot_retention: Option<String>,
}

impl SlaAssignment {
    pub fn protect(object_ids: Vec<String>, sla_id: &str) -> Self {
        Self {
            object_ids,
            sla_id: Some(sla_id.to_string()),
            assign_type: "protectWithSlaId".to_string(),
            apply_to_existing_snapshots: None,
            existing_snapshot_retention: None,
        }
    }
}

pub async fn submit_assign_sla(client: &PolarisClient, assignment: &SlaAssignment) -> Result<Value> {
    let variables = json!({
        "shouldApplyToExistingSnapshots": assignment.apply_to_existing_snapshots,
        "existingSnapshotRetention": assignment.existing_snapshot_retention,
        "globalSlaAssignType": assignment.assign_type,
        "objectIds": assignment.object_ids,
        "slaId": assignment.sla_id,
    });
    tracing::info!(
        "Assigning {} object(s) with {}",
        assignment.object_ids.len(),
        assignment.assign_type
    );
    client.query("core_sla_assign", variables).await
}

/// A snapshot, `{}` when Polaris has nothing for the ID
pub async fn get_snapshot(client: &PolarisClient, snapshot_id: &str) -> Result<Value> {
    let snapshot = client
        .query("core_snappable_snapshot", json!({ "snapshot_id": snapshot_id }))
        .await?;
    Ok(match snapshot {
        Value::Array(items) if items.is_empty() => json!({}),
        other => other,
    })
}

/// A snapshot that can be recovered from
pub async fn validate_snapshot(client: &PolarisClient, snapshot_id: &str) -> Result<Value> {
    if snapshot_id.is_empty() {
        return Err(PolarisError::validation("snapshot_id not specified : "));
    }
    let invalid = || PolarisError::validation(format!("not a valid snapshot_id : {}", snapshot_id));

    let snapshot = get_snapshot(client, snapshot_id).await.map_err(|e| {
        tracing::debug!("Snapshot {} lookup failed: {}", snapshot_id, e);
        invalid()
    })?;
    if snapshot.get("id").is_none() {
        return Err(invalid());
    }

    let flag = |key: &str| snapshot.get(key).and_then(Value::as_bool).unwrap_or(false);
    if flag("isCorrupted") {
        return Err(PolarisError::validation(format!(
            "snapshot_id appears to be corrupted : {}",
            snapshot_id
        )));
    }
    if flag("isDeletedFromSource") {
        return Err(PolarisError::validation(format!(
            "snapshot_id has been deleted from the source : {}",
            snapshot_id
        )));
    }
    if flag("isExpired") {
        return Err(PolarisError::validation(format!("snapshot_id is expired : {}", snapshot_id)));
    }
    Ok(snapshot)
}

/// Which snapshot of an object to pick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPoint {
    Latest,
    /// Closest snapshot taken at or after this instant
    At(DateTime<Utc>),
}

/// Every snapshot of an object, newest first
pub async fn list_snapshots(client: &PolarisClient, snappable_id: &str) -> Result<Value> {
    client
        .query("core_snappable_snapshots", json!({ "snappable_id": snappable_id }))
        .await
}

/// One snapshot of an object, `None` when nothing qualifies
pub async fn find_snapshot(
    client: &PolarisClient,
    snappable_id: &str,
    point: RecoveryPoint,
) -> Result<Option<Value>> {
    match point {
        RecoveryPoint::Latest => {
            // A single page only; `query` would walk every snapshot
            let response = client
                .query_raw(
                    "core_snappable_snapshots",
                    json!({ "snappable_id": snappable_id, "first": 1 }),
                )
                .await?;
            let nodes = crate::graphql::dump_nodes(&response, "snapshotOfASnappableConnection");
            Ok(nodes.as_array().and_then(|items| items.first().cloned()))
        }
        RecoveryPoint::At(at) => {
            let snapshots = list_snapshots(client, snappable_id).await?;
            Ok(closest_snapshot(snapshots.as_array().map(Vec::as_slice).unwrap_or_default(), at))
        }
    }
}

/// The snapshot closest to `at` without being older, with `date_local` added
pub fn closest_snapshot(snapshots: &[Value], at: DateTime<Utc>) -> Option<Value> {
    snapshots
        .iter()
        .filter_map(|snapshot| {
            let date = snapshot.get("date").and_then(Value::as_str)?;
            let date = DateTime::parse_from_rfc3339(date).ok()?.with_timezone(&Utc);
            (date >= at).then_some((date - at, date, snapshot))
        })
        .min_by_key(|(delta, _, _)| *delta)
        .map(|(_, date, snapshot)| {
            let mut snapshot = snapshot.clone();
            if let Value::Object(map) = &mut snapshot {
                map.insert(
                    "date_local".to_string(),
                    Value::String(date.with_timezone(&Local).to_rfc3339()),
                );
            }
            snapshot
        })
}

/// Filters of [`get_event_series_list`]
#[derive(Debug, Clone, Default)]
pub struct EventSeriesFilter {
    pub object_types: Vec<String>,
    pub statuses: Vec<String>,
    pub activity_types: Vec<String>,
    pub severities: Vec<String>,
    pub cluster_ids: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Every event series matching the filter
pub async fn get_event_series_list(client: &PolarisClient, filter: &EventSeriesFilter) -> Result<Value> {
    let variables = json!({
        "filters": {
            "objectType": filter.object_types,
            "lastActivityStatus": filter.statuses,
            "lastActivityType": filter.activity_types,
            "severity": filter.severities,
            "cluster": { "id": filter.cluster_ids },
            "lastUpdated_gt": filter.start_time.map(|t| t.to_rfc3339()),
            "lastUpdated_lt": filter.end_time.map(|t| t.to_rfc3339()),
            "objectName": "",
        }
    });
    client.query("core_event_series_list", variables).await
}

/// One page of event series; comma separated values select several
#[derive(Debug, Clone, Default)]
pub struct EventSeriesQuery {
    pub activity_status: Option<String>,
    pub activity_type: Option<String>,
    pub object_name: Option<String>,
    pub object_type: Option<String>,
    pub severity: Option<String>,
    pub cluster_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: PageArgs,
    /// Merged under the filters built from the fields above
    pub filters: Map<String, Value>,
}

pub async fn list_event_series(client: &PolarisClient, query: &EventSeriesQuery) -> Result<Value> {
    check_first(query.page.first)?;
    let mut filters = query.filters.clone();

    let checked = [
        (&query.activity_status, "lastActivityStatus", "activity_status", "EventStatus"),
        (&query.activity_type, "lastActivityType", "activity_type", "EventType"),
        (&query.object_type, "objectType", "object_type", "EventObjectType"),
        (&query.severity, "severity", "severity", "EventSeverity"),
    ];
    for (value, key, field, enum_name) in checked {
        if let Some(value) = non_empty(value) {
            let values = client.check_enum_list(&split_csv(value), field, enum_name).await?;
            filters.insert(key.to_string(), json!(values));
        }
    }

    if let Some(name) = non_empty(&query.object_name) {
        filters.insert("objectName".to_string(), json!(name));
    }
    if let Some(ids) = non_empty(&query.cluster_id) {
        filters.insert("clusterId".to_string(), json!(split_csv(ids)));
    }
    if let Some(start) = non_empty(&query.start_date) {
        filters.insert("lastUpdatedTimeGt".to_string(), json!(start));
    }
    if let Some(end) = non_empty(&query.end_date) {
        filters.insert("lastUpdatedTimeLt".to_string(), json!(end));
    }

    let mut variables = Map::new();
    variables.insert("filters".to_string(), Value::Object(filters));
    query
        .page
        .apply(client, &mut variables, "ActivitySeriesSortField", "SortOrder")
        .await?;

    client
        .query_raw("core_event_series_list", Value::Object(variables))
        .await
}

/// Protection report rows, every page merged into one response
pub async fn get_report_data(
    client: &PolarisClient,
    object_types: &[String],
    cluster_ids: &[String],
) -> Result<Value> {
    let variables = json!({
        "first": 1000,
        "filters": {
            "objectType": object_types,
            "complianceStatus": [],
            "protectionStatus": [],
            "cluster": { "id": cluster_ids },
        }
    });
    client.query_paginated("core_report_data", variables).await
}

pub async fn get_enum_values(client: &PolarisClient, enum_name: &str) -> Result<Vec<String>> {
    client.enum_values(enum_name).await
}

pub async fn get_polaris_version(client: &PolarisClient) -> Result<String> {
    client.polaris_version().await
}
