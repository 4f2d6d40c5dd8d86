//! AWS EC2 instances

use super::{select_ids, submit_export, submit_restore, ObjectCriteria, RestoreOptions};
use crate::accounts::aws::{account_map, select_connected, AwsAccountMap};
use crate::common::primitives::validate_snapshot;
use crate::error::{PolarisError, Result};
use crate::monitor::Submission;
use crate::polaris::client::PolarisClient;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub async fn list_instances(client: &PolarisClient) -> Result<Value> {
    client.query("compute_aws_ec2", json!({})).await
}

pub async fn get_instance(client: &PolarisClient, object_id: &str) -> Result<Value> {
    client
        .query("compute_aws_ec2_detail", json!({ "object_id": object_id }))
        .await
}

/// IDs of the instances matching `criteria`, tags included
pub async fn object_ids(client: &PolarisClient, criteria: &ObjectCriteria) -> Result<Vec<String>> {
    Ok(select_ids(&list_instances(client).await?, criteria, "tags"))
}

pub async fn restore(client: &PolarisClient, snapshot_id: &str, options: &RestoreOptions) -> Result<Submission> {
    submit_restore(client, "compute_restore_ec2", snapshot_id, options).await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityGroup {
    pub sg_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subnet {
    pub name: String,
    pub availability_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vpc {
    pub vpc_name: String,
    pub security_groups: BTreeMap<String, SecurityGroup>,
    pub subnets: BTreeMap<String, Subnet>,
}

/// VPCs of a region keyed by VPC ID
pub type VpcMap = BTreeMap<String, Vpc>;

/// VPCs, security groups and subnets of an account in a region
pub async fn region_vpcs(client: &PolarisClient, region: &str, aws_native_account_id: &str) -> Result<VpcMap> {
    let region = client.check_enum(region, "region", "AwsNativeRegionEnum").await?;
    let vpcs = client
        .query(
            "compute_aws_region_vpcs",
            json!({ "region": region, "aws_native_account_id": aws_native_account_id }),
        )
        .await?;
    Ok(build_vpc_map(&vpcs))
}

pub fn build_vpc_map(vpcs: &Value) -> VpcMap {
    let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let list = |v: &Value, key: &str| v.get(key).and_then(Value::as_array).cloned().unwrap_or_default();

    vpcs.as_array()
        .into_iter()
        .flatten()
        .map(|vpc| {
            let security_groups = list(vpc, "securityGroups")
                .iter()
                .map(|sg| (text(sg, "id"), SecurityGroup { sg_name: text(sg, "name") }))
                .collect();
            let subnets = list(vpc, "subnets")
                .iter()
                .map(|sn| {
                    (
                        text(sn, "id"),
                        Subnet {
                            name: text(sn, "name"),
                            availability_zone: text(sn, "availabilityZone"),
                        },
                    )
                })
                .collect();
            (
                text(vpc, "id"),
                Vpc {
                    vpc_name: text(vpc, "name"),
                    security_groups,
                    subnets,
                },
            )
        })
        .collect()
}

pub async fn region_kms_keys(client: &PolarisClient, region: &str, aws_native_account_id: &str) -> Result<Value> {
    let region = client.check_enum(region, "region", "AwsNativeRegionEnum").await?;
    client
        .query(
            "compute_aws_region_kmskeys",
            json!({ "region": region, "aws_native_account_id": aws_native_account_id }),
        )
        .await
}

pub async fn region_ssh_key_pairs(
    client: &PolarisClient,
    region: &str,
    aws_native_account_id: &str,
) -> Result<Value> {
    let region = client.check_enum(region, "region", "AwsNativeRegionEnum").await?;
    client
        .query(
            "compute_aws_region_sshkeypairs",
            json!({ "region": region, "aws_native_account_id": aws_native_account_id }),
        )
        .await
}

/// Export of an EC2 snapshot to a new instance
#[derive(Debug, Clone)]
pub struct Ec2ExportRequest {
    pub snapshot_id: String,
    /// Native ID of a connected account
    pub account_number: String,
    pub region: String,
    pub vpc: String,
    pub security_groups: Vec<String>,
    pub subnet: String,
    /// Falls back to the source instance type when unknown
    pub instance_type: Option<String>,
    /// Falls back to the source instance name
    pub instance_name: Option<String>,
    pub copy_tags: bool,
    pub use_replica: bool,
    pub wait: bool,
}

impl Ec2ExportRequest {
    pub fn new(snapshot_id: &str, account_number: &str, region: &str, vpc: &str, subnet: &str) -> Self {
        Self {
            snapshot_id: snapshot_id.to_string(),
            account_number: account_number.to_string(),
            region: region.to_string(),
            vpc: vpc.to_string(),
            security_groups: Vec::new(),
            subnet: subnet.to_string(),
            instance_type: None,
            instance_name: None,
            copy_tags: true,
            use_replica: false,
            wait: false,
        }
    }
}

/// What the export is checked against
pub struct ExportContext<'a> {
    pub source_instance: &'a Value,
    pub accounts: &'a AwsAccountMap,
    pub regions: &'a [String],
    pub instance_types: &'a [String],
    pub vpcs: &'a VpcMap,
}

/// Export an EC2 snapshot into a connected account
pub async fn export(client: &PolarisClient, request: &Ec2ExportRequest) -> Result<Submission> {
    let snapshot = validate_snapshot(client, &request.snapshot_id).await?;
    let snappable_id = snapshot
        .get("snappableId")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let source_instance = get_instance(client, snappable_id).await?;

    let accounts = account_map(client).await?;
    let account = select_connected(&accounts, &request.account_number)?;
    let regions = client.enum_values("AwsNativeRegionEnum").await?;
    check_region(&request.region, &regions)?;
    let instance_types = client.enum_values("AwsNativeEc2InstanceTypeEnum").await?;

    let vpcs = build_vpc_map(
        &client
            .query(
                "compute_aws_region_vpcs",
                json!({ "region": request.region, "aws_native_account_id": account.id }),
            )
            .await?,
    );

    let context = ExportContext {
        source_instance: &source_instance,
        accounts: &accounts,
        regions: &regions,
        instance_types: &instance_types,
        vpcs: &vpcs,
    };
    let variables = export_variables(request, &context)?;
    tracing::info!(
        "Exporting snapshot {} to account {} in {}",
        request.snapshot_id,
        request.account_number,
        request.region
    );
    submit_export(client, "compute_export_ec2", variables, request.wait).await
}

fn check_region(region: &str, regions: &[String]) -> Result<()> {
    if region.is_empty() || !regions.iter().any(|r| r == region) {
        return Err(PolarisError::validation(format!(
            "region not found, valid regions are {:?}",
            regions
        )));
    }
    Ok(())
}

/// Validate an export against its context and build the mutation variables
pub fn export_variables(request: &Ec2ExportRequest, context: &ExportContext<'_>) -> Result<Value> {
    let account = select_connected(context.accounts, &request.account_number)?;
    check_region(&request.region, context.regions)?;

    let source_field = |key: &str| {
        context
            .source_instance
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let instance_type = match request.instance_type.as_deref() {
        Some(t) if context.instance_types.iter().any(|known| known == t) => t.to_string(),
        _ => source_field("instanceType"),
    };
    let instance_name = match request.instance_name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => source_field("instanceName"),
    };

    let vpc = context
        .vpcs
        .get(&request.vpc)
        .filter(|_| !request.vpc.is_empty())
        .ok_or_else(|| {
            PolarisError::validation(format!(
                "vpc not found, valid vpcs are {:?}",
                context.vpcs.keys().collect::<Vec<_>>()
            ))
        })?;

    for sg in &request.security_groups {
        if sg.is_empty() || !vpc.security_groups.contains_key(sg) {
            return Err(PolarisError::validation(format!(
                "security_group not found, valid security_groups are {:?}",
                vpc.security_groups.keys().collect::<Vec<_>>()
            )));
        }
    }

    if request.subnet.is_empty() || !vpc.subnets.contains_key(&request.subnet) {
        return Err(PolarisError::validation(format!(
            "subnet not found, valid subnets are {:?}",
            vpc.subnets.keys().collect::<Vec<_>>()
        )));
    }

    Ok(json!({
        "snapshot_id": request.snapshot_id,
        "account_id": account.id,
        "security_group_ids": request.security_groups,
        "subnet_id": request.subnet,
        "region": request.region,
        "instance_name": instance_name,
        "instance_type": instance_type,
        "copy_tags": request.copy_tags,
        "use_replica": request.use_replica,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::aws::AwsAccountSummary;

    fn vpcs() -> VpcMap {
        build_vpc_map(&json!([{
            "id": "vpc-1",
            "name": "main",
            "securityGroups": [{"id": "sg-1", "name": "default"}],
            "subnets": [{"id": "subnet-1", "name": "a", "availabilityZone": "us-east-1a"}]
        }]))
    }

    fn accounts() -> AwsAccountMap {
        let mut map = AwsAccountMap::new();
        map.insert(
            "111111111111".to_string(),
            AwsAccountSummary {
                id: "polaris-1".to_string(),
                account_name: "prod".to_string(),
                status: Some("CONNECTED".to_string()),
                regions: vec!["US_EAST_1".to_string()],
            },
        );
        map.insert(
            "222222222222".to_string(),
            AwsAccountSummary {
                id: "polaris-2".to_string(),
                account_name: "old".to_string(),
                status: Some("DISCONNECTED".to_string()),
                regions: vec![],
            },
        );
        map
    }

    fn request() -> Ec2ExportRequest {
        let mut request = Ec2ExportRequest::new("snap", "111111111111", "US_EAST_1", "vpc-1", "subnet-1");
        request.security_groups = vec!["sg-1".to_string()];
        request
    }

    fn run(request: &Ec2ExportRequest) -> Result<Value> {
        let source = json!({"instanceType": "T2_MICRO", "instanceName": "web"});
        let accounts = accounts();
        let regions = vec!["US_EAST_1".to_string(), "US_WEST_2".to_string()];
        let types = vec!["T2_MICRO".to_string(), "M5_LARGE".to_string()];
        let vpcs = vpcs();
        export_variables(
            request,
            &ExportContext {
                source_instance: &source,
                accounts: &accounts,
                regions: &regions,
                instance_types: &types,
                vpcs: &vpcs,
            },
        )
    }

    #[test]
    fn test_vpc_map_shape() {
        let map = vpcs();
        let vpc = &map["vpc-1"];
        assert_eq!(vpc.vpc_name, "main");
        assert_eq!(vpc.security_groups["sg-1"].sg_name, "default");
        assert_eq!(vpc.subnets["subnet-1"].availability_zone, "us-east-1a");
        let as_json = serde_json::to_value(&map).unwrap();
        assert_eq!(as_json["vpc-1"]["subnets"]["subnet-1"]["name"], json!("a"));
    }

    #[test]
    fn test_export_defaults_and_fallbacks() {
        let vars = run(&request()).unwrap();
        assert_eq!(vars["account_id"], json!("polaris-1"));
        assert_eq!(vars["instance_type"], json!("T2_MICRO"));
        assert_eq!(vars["instance_name"], json!("web"));
        assert_eq!(vars["copy_tags"], json!(true));
        assert_eq!(vars["use_replica"], json!(false));
    }

    #[test]
    fn test_export_keeps_known_instance_type() {
        let mut req = request();
        req.instance_type = Some("M5_LARGE".to_string());
        req.instance_name = Some("restored".to_string());
        let vars = run(&req).unwrap();
        assert_eq!(vars["instance_type"], json!("M5_LARGE"));
        assert_eq!(vars["instance_name"], json!("restored"));

        req.instance_type = Some("bogus".to_string());
        assert_eq!(run(&req).unwrap()["instance_type"], json!("T2_MICRO"));
    }

    #[test]
    fn test_export_rejects_disconnected_account() {
        let mut req = request();
        req.account_number = "222222222222".to_string();
        let err = run(&req).unwrap_err().to_string();
        assert!(err.starts_with("account_number not found or not connected"));
        assert!(err.contains("111111111111"));
        assert!(!err.contains("222222222222"));
    }

    #[test]
    fn test_export_validation_order() {
        let mut req = request();
        req.region = "MARS_1".to_string();
        assert!(run(&req).unwrap_err().to_string().starts_with("region not found"));

        let mut req = request();
        req.vpc = "vpc-9".to_string();
        assert!(run(&req).unwrap_err().to_string().contains("vpc-1"));

        let mut req = request();
        req.security_groups.push("sg-9".to_string());
        assert!(run(&req).unwrap_err().to_string().starts_with("security_group not found"));

        let mut req = request();
        req.subnet = String::new();
        assert!(run(&req).unwrap_err().to_string().starts_with("subnet not found"));
    }
}
