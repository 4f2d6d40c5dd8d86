//! AWS accounts
//!
//! Polaris onboards an AWS account in two steps: `initiate` returns a
//! CloudFormation template the account owner has to deploy, `commit` binds
//! the account to the regions it is protected in. Deploying and removing
//! the stacks happens in AWS and is left to the caller.

use super::require_member;
use crate::error::{PolarisError, Result, ResultExt};
use crate::monitor::{self, MonitorOptions};
use crate::polaris::client::PolarisClient;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const CLOUD_NATIVE_PROTECTION: &str = "CLOUD_NATIVE_PROTECTION";

/// Polaris view of an AWS account, keyed by native account ID in [`AwsAccountMap`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AwsAccountSummary {
    /// Polaris ID
    pub id: String,
    pub account_name: String,
    /// Status of the CLOUD_NATIVE_PROTECTION feature
    pub status: Option<String>,
    pub regions: Vec<String>,
}

impl AwsAccountSummary {
    pub fn is_connected(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("connected"))
    }
}

pub type AwsAccountMap = BTreeMap<String, AwsAccountSummary>;

/// AWS accounts whose name contains `filter`
pub async fn list_accounts(client: &PolarisClient, filter: &str) -> Result<Value> {
    client.query("accounts_aws", json!({ "filter": filter })).await
}

/// Cloud account records with per-feature details
pub async fn list_account_details(client: &PolarisClient, filter: &str) -> Result<Value> {
    client.query("accounts_aws_detail", json!({ "filter": filter })).await
}

pub async fn account_map(client: &PolarisClient) -> Result<AwsAccountMap> {
    Ok(build_account_map(&list_account_details(client, "").await?))
}

/// Index `allAwsCloudAccounts` records by native account ID
pub fn build_account_map(details: &Value) -> AwsAccountMap {
    let mut map = AwsAccountMap::new();
    for record in details.as_array().into_iter().flatten() {
        let account = &record["awsCloudAccount"];
        let Some(native_id) = account.get("nativeId").and_then(Value::as_str) else {
            continue;
        };

        let feature = record
            .get("featureDetails")
            .and_then(Value::as_array)
            .and_then(|features| {
                features
                    .iter()
                    .find(|f| f.get("feature").and_then(Value::as_str) == Some(CLOUD_NATIVE_PROTECTION))
            });

        map.insert(
            native_id.to_string(),
            AwsAccountSummary {
                id: str_field(account, "id"),
                account_name: str_field(account, "accountName"),
                status: feature
                    .and_then(|f| f.get("status"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                regions: feature
                    .and_then(|f| f.get("awsRegions"))
                    .and_then(Value::as_array)
                    .map(|r| r.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default(),
            },
        );
    }
    map
}

/// Fail unless `polaris_id` is the Polaris ID of a known AWS account
pub async fn validate_native_account_id(client: &PolarisClient, polaris_id: &str) -> Result<String> {
    let accounts = account_map(client).await?;
    if accounts.values().any(|a| a.id == polaris_id) {
        return Ok(polaris_id.to_string());
    }
    Err(PolarisError::validation(format!(
        "aws_native_account_id not found: {}",
        polaris_id
    )))
}

/// The connected account with native ID `account_number`
pub async fn connected_account(client: &PolarisClient, account_number: &str) -> Result<AwsAccountSummary> {
    let accounts = account_map(client).await?;
    select_connected(&accounts, account_number)
}

pub(crate) fn select_connected(accounts: &AwsAccountMap, account_number: &str) -> Result<AwsAccountSummary> {
    match accounts.get(account_number) {
        Some(account) if account.is_connected() => Ok(account.clone()),
        _ => {
            let connected: Vec<&String> = accounts
                .iter()
                .filter(|(_, a)| a.is_connected())
                .map(|(native_id, _)| native_id)
                .collect();
            Err(PolarisError::validation(format!(
                "account_number not found or not connected, valid account numbers are {:?}",
                connected
            )))
        }
    }
}

/// An AWS account to onboard
#[derive(Debug, Clone, Default)]
pub struct AwsAccountSpec {
    pub native_id: String,
    /// Organization account name, if the account belongs to one
    pub account_name: Option<String>,
    /// Local AWS profile the account was read from
    pub profile: Option<String>,
    /// AwsCloudAccountRegionEnum values, e.g. `US_EAST_1`
    pub regions: Vec<String>,
    /// CloudAccountFeatureEnum values, CLOUD_NATIVE_PROTECTION when empty
    pub features: Vec<String>,
}

impl AwsAccountSpec {
    /// `native id : name : profile`, skipping the parts that are unset
    pub fn display_name(&self) -> String {
        std::iter::once(self.native_id.as_str())
            .chain(self.account_name.as_deref())
            .chain(self.profile.as_deref())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" : ")
    }
}

/// What the account owner deploys to finish onboarding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudFormationHandoff {
    pub external_id: String,
    pub stack_name: String,
    pub template_url: String,
    pub cloud_formation_url: Option<String>,
    /// AWS region the stack goes to, e.g. `us-east-1`
    pub region: Option<String>,
}

/// Register an AWS account and return the stack to deploy
pub async fn add_account(client: &PolarisClient, spec: &AwsAccountSpec) -> Result<CloudFormationHandoff> {
    if spec.native_id.is_empty() {
        return Err(PolarisError::validation("aws_account_id field is required."));
    }
    let features = if spec.features.is_empty() {
        vec![CLOUD_NATIVE_PROTECTION.to_string()]
    } else {
        spec.features.clone()
    };

    require_member(client, "CREATE", "CloudAccountActionEnum", "features").await?;
    for feature in &features {
        require_member(client, feature, "CloudAccountFeatureEnum", "features").await?;
    }
    for region in &spec.regions {
        require_member(client, region, "AwsCloudAccountRegionEnum", "regions").await?;
    }

    let name = spec.display_name();
    let initiated = client
        .query(
            "accounts_aws_add_initiate",
            json!({
                "aws_account_id": spec.native_id,
                "account_name": name,
                "cloud_account_action": "CREATE",
                "cloud_account_features": features,
            }),
        )
        .await?;
    if let Some(message) = first_message(&initiated, "/validateResponse/invalidAwsAccounts") {
        return Err(already_added(&spec.native_id, &message));
    }

    let initiate = &initiated["initiateResponse"];
    let handoff = CloudFormationHandoff {
        external_id: str_field(initiate, "externalId"),
        stack_name: str_field(initiate, "stackName"),
        template_url: str_field(initiate, "templateUrl"),
        cloud_formation_url: initiate
            .get("cloudFormationUrl")
            .and_then(Value::as_str)
            .map(str::to_string),
        region: spec.regions.first().map(|r| aws_region_name(r)),
    };

    let committed = client
        .query(
            "accounts_aws_add_commit",
            json!({
                "aws_account_id": spec.native_id,
                "aws_account_name": name,
                "aws_regions": spec.regions,
                "external_id": handoff.external_id,
                "feature_versions": initiate.get("featureVersionList").cloned().unwrap_or_else(|| json!([])),
                "stack_name": handoff.stack_name,
                "cloud_account_action": "CREATE",
                "cloud_account_features": features,
            }),
        )
        .await?;
    if let Some(message) = first_message(&committed, "/awsChildAccounts") {
        return Err(already_added(&spec.native_id, &message));
    }

    tracing::info!("AWS account {} added, stack {}", spec.native_id, handoff.stack_name);
    Ok(handoff)
}

/// A CloudFormation stack left behind by a deleted account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackRemoval {
    pub stack_name: Option<String>,
    /// AWS region name, e.g. `us-east-1`
    pub region: String,
}

/// Disabled and pending deletion; commit once the stacks are gone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountDeletion {
    pub polaris_account_id: String,
    pub stacks: Vec<StackRemoval>,
    pub cloud_formation_url: Option<String>,
}

/// Disable protection and start deleting an account
pub async fn delete_account(client: &PolarisClient, native_id: &str) -> Result<AccountDeletion> {
    start_account_delete(client, native_id)
        .await
        .operation("Failed to delete AWS account")
}

async fn start_account_delete(client: &PolarisClient, native_id: &str) -> Result<AccountDeletion> {
    let details = list_account_details(client, native_id).await?;
    let record = details
        .as_array()
        .and_then(|records| {
            records.iter().find(|r| {
                r.pointer("/awsCloudAccount/nativeId").and_then(Value::as_str) == Some(native_id)
            })
        })
        .ok_or_else(|| PolarisError::NotFound(format!("AWS account {} is not in Polaris", native_id)))?;
    let polaris_account_id = str_field(&record["awsCloudAccount"], "id");

    disable_account(client, &polaris_account_id).await?;

    let initiated = client
        .query(
            "accounts_aws_delete_initiate",
            json!({ "cloud_account_uuid": polaris_account_id }),
        )
        .await?;

    tracing::info!("AWS account {} disabled, deletion initiated", native_id);
    Ok(AccountDeletion {
        stacks: stacks_to_remove(record),
        cloud_formation_url: initiated
            .get("cloudFormationUrl")
            .and_then(Value::as_str)
            .map(str::to_string),
        polaris_account_id,
    })
}

async fn disable_account(client: &PolarisClient, polaris_account_id: &str) -> Result<()> {
    let response = client
        .query(
            "accounts_aws_disable",
            json!({ "polaris_account_id": polaris_account_id }),
        )
        .await?;
    if let Some(error) = response.get("error").and_then(Value::as_str).filter(|e| !e.is_empty()) {
        return Err(PolarisError::validation(format!("Failed to disable account: {}", error)));
    }

    let ids = monitor::taskchain_ids(&response);
    let outcomes = monitor::wait_for_tasks(client, &ids, MonitorOptions::default()).await?;
    if outcomes.is_empty() || !outcomes.iter().all(|o| o.succeeded()) {
        return Err(PolarisError::validation("Failed to disable account"));
    }
    Ok(())
}

/// Finish deleting an account once its stacks are removed
pub async fn commit_account_delete(client: &PolarisClient, polaris_account_id: &str) -> Result<Value> {
    client
        .query(
            "accounts_aws_delete_commit",
            json!({ "cloud_account_uuid": polaris_account_id }),
        )
        .await
}

/// Re-initiate features that lost permissions; `None` when nothing to do
pub async fn update_account(client: &PolarisClient, native_id: &str) -> Result<Option<Value>> {
    let details = list_account_details(client, native_id).await?;
    let Some(record) = details.as_array().and_then(|r| r.first()) else {
        return Ok(None);
    };
    let polaris_account_id = str_field(&record["awsCloudAccount"], "id");

    let mut update = None;
    for feature in record
        .get("featureDetails")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|f| f.get("feature").and_then(Value::as_str) == Some(CLOUD_NATIVE_PROTECTION))
    {
        match feature.get("status").and_then(Value::as_str) {
            Some("MISSING_PERMISSIONS") => {
                update = Some(
                    client
                        .query(
                            "accounts_aws_update_initiate",
                            json!({
                                "polaris_account_id": polaris_account_id,
                                "aws_native_protection_feature": [CLOUD_NATIVE_PROTECTION],
                            }),
                        )
                        .await?,
                );
            }
            Some("DISCONNECTED") => {
                tracing::warn!("AWS account {} is disconnected and needs to be recreated", native_id);
            }
            _ => {}
        }
    }
    Ok(update)
}

fn stacks_to_remove(record: &Value) -> Vec<StackRemoval> {
    record
        .get("featureDetails")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|f| f.get("feature").and_then(Value::as_str) == Some(CLOUD_NATIVE_PROTECTION))
        .flat_map(|feature| {
            let stack_name = feature
                .get("stackArn")
                .and_then(Value::as_str)
                .and_then(stack_name_from_arn);
            feature
                .get("awsRegions")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(move |region| StackRemoval {
                    stack_name: stack_name.clone(),
                    region: aws_region_name(region),
                })
        })
        .collect()
}

/// `arn:aws:cloudformation:us-east-1:123:stack/<name>/<uuid>` -> `<name>`
pub fn stack_name_from_arn(arn: &str) -> Option<String> {
    let start = arn.find('/')?;
    let end = arn.rfind('/')?;
    (end > start).then(|| arn[start + 1..end].to_string())
}

/// `US_EAST_1` -> `us-east-1`
pub fn aws_region_name(region: &str) -> String {
    region.replace('_', "-").to_lowercase()
}

fn first_message(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("message").and_then(Value::as_str))
        .find(|m| !m.is_empty())
        .map(str::to_string)
}

fn already_added(native_id: &str, message: &str) -> PolarisError {
    PolarisError::validation(format!("Account {} already added: {}", native_id, message))
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> Value {
        json!([
            {
                "awsCloudAccount": {"id": "p1", "nativeId": "111111111111", "accountName": "prod"},
                "featureDetails": [
                    {"feature": "CLOUD_NATIVE_PROTECTION", "status": "CONNECTED",
                     "awsRegions": ["US_EAST_1", "EU_WEST_1"],
                     "stackArn": "arn:aws:cloudformation:us-east-1:111111111111:stack/rubrik-polaris/0a1b2c"}
                ]
            },
            {
                "awsCloudAccount": {"id": "p2", "nativeId": "222222222222", "accountName": "dev"},
                "featureDetails": [
                    {"feature": "CLOUD_NATIVE_PROTECTION", "status": "DISCONNECTED", "awsRegions": []}
                ]
            }
        ])
    }

    #[test]
    fn test_build_account_map() {
        let map = build_account_map(&details());
        assert_eq!(map.len(), 2);
        let prod = &map["111111111111"];
        assert_eq!(prod.id, "p1");
        assert_eq!(prod.regions, vec!["US_EAST_1", "EU_WEST_1"]);
        assert!(prod.is_connected());
        assert!(!map["222222222222"].is_connected());
    }

    #[test]
    fn test_select_connected() {
        let map = build_account_map(&details());
        assert_eq!(select_connected(&map, "111111111111").unwrap().id, "p1");
        let err = select_connected(&map, "222222222222").unwrap_err();
        assert_eq!(
            err.to_string(),
            "account_number not found or not connected, valid account numbers are [\"111111111111\"]"
        );
    }

    #[test]
    fn test_stacks_to_remove() {
        let stacks = stacks_to_remove(&details()[0]);
        assert_eq!(
            stacks,
            vec![
                StackRemoval { stack_name: Some("rubrik-polaris".to_string()), region: "us-east-1".to_string() },
                StackRemoval { stack_name: Some("rubrik-polaris".to_string()), region: "eu-west-1".to_string() },
            ]
        );
    }

    #[test]
    fn test_stack_name_from_arn() {
        assert_eq!(stack_name_from_arn("arn:x:stack/name/uuid").as_deref(), Some("name"));
        assert_eq!(stack_name_from_arn("arn:x:stack/only"), None);
    }

    #[test]
    fn test_display_name() {
        let spec = AwsAccountSpec {
            native_id: "111111111111".to_string(),
            account_name: Some("prod".to_string()),
            profile: Some("default".to_string()),
            ..Default::default()
        };
        assert_eq!(spec.display_name(), "111111111111 : prod : default");

        let bare = AwsAccountSpec {
            native_id: "111111111111".to_string(),
            ..Default::default()
        };
        assert_eq!(bare.display_name(), "111111111111");
    }

    #[test]
    fn test_first_message() {
        let response = json!({"validateResponse": {"invalidAwsAccounts": [
            {"nativeId": "1", "message": ""},
            {"nativeId": "1", "message": "exists"}
        ]}});
        assert_eq!(
            first_message(&response, "/validateResponse/invalidAwsAccounts").as_deref(),
            Some("exists")
        );
        assert!(first_message(&json!({"awsChildAccounts": []}), "/awsChildAccounts").is_none());
    }
}
