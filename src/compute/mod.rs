//! Cloud and vSphere compute instances

pub mod azurevm;
pub mod ec2;
pub mod gce;
pub mod vsphere;

use crate::common::primitives::validate_snapshot;
use crate::error::Result;
use crate::monitor::{self, MonitorOptions, Submission};
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Selects instances by top-level field values and tags
///
/// Every field and every tag is one criterion. With `match_all` an
/// instance must satisfy all of them, otherwise at least one.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectCriteria {
    pub fields: BTreeMap<String, Value>,
    pub tags: BTreeMap<String, String>,
    pub match_all: bool,
}

impl Default for ObjectCriteria {
    fn default() -> Self {
        Self {
            fields: BTreeMap::new(),
            tags: BTreeMap::new(),
            match_all: true,
        }
    }
}

impl ObjectCriteria {
    /// Match any criterion instead of all of them
    pub fn any() -> Self {
        Self {
            match_all: false,
            ..Default::default()
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len() + self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Criteria satisfied by `instance`; tags are read from its `tag_key` list
    pub fn matched(&self, instance: &Value, tag_key: &str) -> usize {
        let fields = self
            .fields
            .iter()
            .filter(|(key, expected)| instance.get(key.as_str()) == Some(*expected))
            .count();

        let instance_tags = instance.get(tag_key).and_then(Value::as_array);
        let tags = self
            .tags
            .iter()
            .filter(|(key, value)| {
                instance_tags.into_iter().flatten().any(|t| {
                    t.get("key").and_then(Value::as_str) == Some(key.as_str())
                        && t.get("value").and_then(Value::as_str) == Some(value.as_str())
                })
            })
            .count();

        fields + tags
    }

    pub fn matches(&self, instance: &Value, tag_key: &str) -> bool {
        let matched = self.matched(instance, tag_key);
        if self.match_all {
            matched == self.len()
        } else {
            matched >= 1
        }
    }
}

/// IDs of the instances in a node list that satisfy `criteria`
pub fn select_ids(instances: &Value, criteria: &ObjectCriteria, tag_key: &str) -> Vec<String> {
    instances
        .as_array()
        .into_iter()
        .flatten()
        .filter(|instance| criteria.matches(instance, tag_key))
        .filter_map(|instance| instance.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Flags of an in-place restore
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    pub should_power_on: bool,
    pub should_restore_tags: bool,
    pub wait: bool,
    pub monitor: MonitorOptions,
}

/// Restore an instance from one of its snapshots
pub(crate) async fn submit_restore(
    client: &PolarisClient,
    mutation: &str,
    snapshot_id: &str,
    options: &RestoreOptions,
) -> Result<Submission> {
    validate_snapshot(client, snapshot_id).await?;

    let variables = json!({
        "snapshot_id": snapshot_id,
        "should_power_on": options.should_power_on,
        "should_restore_tags": options.should_restore_tags,
    });
    let response = client.query(mutation, variables).await?;
    tracing::info!("Restore of snapshot {} submitted", snapshot_id);
    monitor::submission(client, response, options.wait, options.monitor).await
}

/// Export a snapshot with already validated variables
pub(crate) async fn submit_export(
    client: &PolarisClient,
    mutation: &str,
    variables: Value,
    wait: bool,
) -> Result<Submission> {
    let response = client.query(mutation, variables).await?;
    monitor::submission(client, response, wait, MonitorOptions::default()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instances() -> Value {
        json!([
            {"id": "a", "region": "US_EAST_1", "instanceType": "t2.micro",
             "tags": [{"key": "env", "value": "prod"}, {"key": "team", "value": "db"}]},
            {"id": "b", "region": "US_WEST_2", "instanceType": "t2.micro",
             "tags": [{"key": "env", "value": "dev"}]},
            {"id": "c", "region": "US_EAST_1", "instanceType": "m5.large"}
        ])
    }

    #[test]
    fn test_match_all_fields_and_tags() {
        let criteria = ObjectCriteria::default()
            .field("region", "US_EAST_1")
            .tag("env", "prod");
        assert_eq!(select_ids(&instances(), &criteria, "tags"), vec!["a"]);
    }

    #[test]
    fn test_each_tag_is_a_criterion() {
        let criteria = ObjectCriteria::default().tag("env", "prod").tag("team", "web");
        assert_eq!(criteria.len(), 2);
        assert!(select_ids(&instances(), &criteria, "tags").is_empty());
    }

    #[test]
    fn test_match_any() {
        let criteria = ObjectCriteria::any()
            .field("instanceType", "m5.large")
            .tag("env", "dev");
        assert_eq!(select_ids(&instances(), &criteria, "tags"), vec!["b", "c"]);
    }

    #[test]
    fn test_match_any_includes_full_matches() {
        let criteria = ObjectCriteria::any().field("region", "US_EAST_1");
        assert_eq!(select_ids(&instances(), &criteria, "tags"), vec!["a", "c"]);
    }

    #[test]
    fn test_no_criteria() {
        assert_eq!(
            select_ids(&instances(), &ObjectCriteria::default(), "tags"),
            vec!["a", "b", "c"]
        );
        assert!(select_ids(&instances(), &ObjectCriteria::any(), "tags").is_empty());
    }

    #[test]
    fn test_missing_tag_list_never_matches_tags() {
        let criteria = ObjectCriteria::default().tag("env", "prod");
        assert!(!criteria.matches(&instances()[2], "tags"));
        assert!(!criteria.matches(&instances()[0], "labels"));
    }
}
