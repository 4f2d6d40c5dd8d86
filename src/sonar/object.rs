//! Objects with sensitive hits

use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};

pub const DEFAULT_SEARCH_DAYS: u32 = 7;

/// Objects scanned on `day` (`YYYY-MM-DD`), all pages
pub async fn get_sensitive_hits_object_list(client: &PolarisClient, day: &str, timezone: &str) -> Result<Value> {
    if day.is_empty() {
        return Err(PolarisError::validation("day field is required."));
    }
    client
        .query(
            "sonar_sensitive_hits_object_list",
            json!({ "day": day, "timezone": timezone }),
        )
        .await
}

pub async fn get_sensitive_hits_object_detail(
    client: &PolarisClient,
    snapshot_id: &str,
    snappable_id: &str,
) -> Result<Value> {
    if snapshot_id.is_empty() || snappable_id.is_empty() {
        return Err(PolarisError::validation(
            "snapshot_id and snappable_id(object ID) fields are required.",
        ));
    }
    client
        .query_raw(
            "sonar_sensitive_hits_object_detail",
            json!({ "snapshotFid": snapshot_id, "snappableFid": snappable_id }),
        )
        .await
}

/// An object and the snapshot its hits were found in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitLocation {
    pub snappable_id: String,
    pub snapshot_fid: String,
}

/// Last object of a day's list named `object_name`, or the last one at all
pub fn locate_hits(objects: &Value, object_name: Option<&str>) -> Option<HitLocation> {
    objects
        .as_array()?
        .iter()
        .filter(|o| match object_name {
            Some(name) => o.pointer("/snappable/name").and_then(Value::as_str) == Some(name),
            None => true,
        })
        .filter_map(|o| {
            Some(HitLocation {
                snappable_id: o.pointer("/snappable/id")?.as_str()?.to_string(),
                snapshot_fid: o
                    .pointer("/objectStatus/latestSnapshotResult/snapshotFid")?
                    .as_str()?
                    .to_string(),
            })
        })
        .last()
}

/// Days searched, newest first
pub fn search_days(today: NaiveDate, search_days: u32) -> Vec<String> {
    (0..search_days.max(1))
        .map(|d| (today - Duration::days(i64::from(d))).format("%Y-%m-%d").to_string())
        .collect()
}

/// Sensitive hits of the most recently scanned object, looking back up to
/// `days` days; `{}` when nothing was scanned
pub async fn get_sensitive_hits(client: &PolarisClient, days: u32, object_name: Option<&str>) -> Result<Value> {
    let object_name = object_name.filter(|n| !n.is_empty());
    for day in search_days(Utc::now().date_naive(), days) {
        let objects = get_sensitive_hits_object_list(client, &day, "UTC").await?;
        if let Some(found) = locate_hits(&objects, object_name) {
            tracing::debug!("Sensitive hits found on {} for {}", day, found.snappable_id);
            return get_sensitive_hits_object_detail(client, &found.snapshot_fid, &found.snappable_id).await;
        }
    }
    Ok(json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objects() -> Value {
        json!([
            {"snappable": {"id": "a", "name": "fs-1"},
             "objectStatus": {"latestSnapshotResult": {"snapshotFid": "s-a"}}},
            {"snappable": {"id": "b", "name": "fs-2"},
             "objectStatus": {"latestSnapshotResult": {"snapshotFid": "s-b"}}}
        ])
    }

    #[test]
    fn test_locate_by_name() {
        let found = locate_hits(&objects(), Some("fs-1")).unwrap();
        assert_eq!(found.snappable_id, "a");
        assert_eq!(found.snapshot_fid, "s-a");
        assert!(locate_hits(&objects(), Some("fs-9")).is_none());
    }

    #[test]
    fn test_last_match_wins() {
        assert_eq!(locate_hits(&objects(), None).unwrap().snappable_id, "b");
        assert!(locate_hits(&json!([]), None).is_none());
    }

    #[test]
    fn test_search_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(
            search_days(today, 3),
            vec!["2024-03-02", "2024-03-01", "2024-02-29"]
        );
        assert_eq!(search_days(today, 0), vec!["2024-03-02"]);
    }
}
