//! Integration tests for cloud account onboarding and removal
//!
//! Every Polaris call goes to the same `/api/graphql` endpoint, so mocks are
//! told apart by the root field named in the document.

use rubrik_polaris::accounts::aws::{self, AwsAccountSpec, StackRemoval};
use rubrik_polaris::accounts::gcp::{self, GcpProjectSource};
use rubrik_polaris::polaris::auth::BaseUrl;
use rubrik_polaris::PolarisClient;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> PolarisClient {
    let base = BaseUrl::new(&format!("{}/api", server.uri()));
    PolarisClient::with_token(base, "test-token").expect("client should build")
}

/// POST to the GraphQL endpoint whose document uses `root`
fn graphql(root: &str) -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path("/api/graphql"))
        .and(body_string_contains(root))
}

fn data(root: &str, value: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": { root: value } }))
}

async fn mount_enum(server: &MockServer, enum_name: &str, values: &[&str]) {
    let states: Vec<Value> = values.iter().map(|v| json!({ "name": v })).collect();
    Mock::given(method("POST"))
        .and(path("/api/graphql"))
        .and(body_partial_json(json!({ "variables": { "enum_name": enum_name } })))
        .respond_with(data("states", json!({ "states": states })))
        .mount(server)
        .await;
}

async fn mount_taskchain(server: &MockServer, state: &str) {
    graphql("getTaskchainInfo")
        .respond_with(data(
            "getTaskchainInfo",
            json!({ "taskchain": { "id": "1", "taskchainUuid": "tc-1", "state": state } }),
        ))
        .mount(server)
        .await;
}

mod aws_tests {
    use super::*;

    const NATIVE_ID: &str = "111111111111";

    async fn mount_aws_enums(server: &MockServer) {
        mount_enum(server, "CloudAccountActionEnum", &["CREATE", "DELETE"]).await;
        mount_enum(server, "CloudAccountFeatureEnum", &["CLOUD_NATIVE_PROTECTION"]).await;
        mount_enum(server, "AwsCloudAccountRegionEnum", &["US_EAST_1", "US_WEST_2"]).await;
    }

    fn spec() -> AwsAccountSpec {
        AwsAccountSpec {
            native_id: NATIVE_ID.to_string(),
            account_name: Some("prod".to_string()),
            regions: vec!["US_EAST_1".to_string()],
            ..Default::default()
        }
    }

    fn initiate_response(invalid: Value) -> Value {
        json!({
            "initiateResponse": {
                "cloudFormationUrl": "https://console.aws.amazon.com/cloudformation",
                "externalId": "ext-42",
                "featureVersionList": [{"feature": "CLOUD_NATIVE_PROTECTION", "version": 3}],
                "stackName": "rubrik-polaris-stack",
                "templateUrl": "https://templates.example.com/polaris.json"
            },
            "validateResponse": {"invalidAwsAccounts": invalid, "invalidAwsAdminAccount": null}
        })
    }

    fn account_details() -> Value {
        json!([{
            "awsCloudAccount": {"id": "p1", "nativeId": NATIVE_ID, "accountName": "prod"},
            "featureDetails": [{
                "feature": "CLOUD_NATIVE_PROTECTION",
                "status": "CONNECTED",
                "awsRegions": ["US_EAST_1"],
                "stackArn": "arn:aws:cloudformation:us-east-1:111111111111:stack/rubrik-polaris-stack/0a1b"
            }]
        }])
    }

    #[tokio::test]
    async fn test_add_account_initiates_then_commits() {
        let server = MockServer::start().await;
        mount_aws_enums(&server).await;

        graphql("validateAndCreateAwsCloudAccount")
            .and(body_partial_json(json!({"variables": {
                "aws_account_id": NATIVE_ID,
                "account_name": "111111111111 : prod"
            }})))
            .respond_with(data("validateAndCreateAwsCloudAccount", initiate_response(json!([]))))
            .expect(1)
            .mount(&server)
            .await;
        graphql("finalizeAwsCloudAccountProtection")
            .and(body_partial_json(json!({"variables": {
                "external_id": "ext-42",
                "stack_name": "rubrik-polaris-stack",
                "aws_regions": ["US_EAST_1"],
                "feature_versions": [{"feature": "CLOUD_NATIVE_PROTECTION", "version": 3}]
            }})))
            .respond_with(data(
                "finalizeAwsCloudAccountProtection",
                json!({"awsChildAccounts": [{"nativeId": NATIVE_ID, "message": ""}], "message": ""}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let handoff = aws::add_account(&client, &spec()).await.unwrap();
        assert_eq!(handoff.external_id, "ext-42");
        assert_eq!(handoff.stack_name, "rubrik-polaris-stack");
        assert_eq!(handoff.template_url, "https://templates.example.com/polaris.json");
        assert_eq!(handoff.region.as_deref(), Some("us-east-1"));
    }

    #[tokio::test]
    async fn test_add_account_already_added() {
        let server = MockServer::start().await;
        mount_aws_enums(&server).await;

        graphql("validateAndCreateAwsCloudAccount")
            .respond_with(data(
                "validateAndCreateAwsCloudAccount",
                initiate_response(json!([{"nativeId": NATIVE_ID, "message": "account already exists"}])),
            ))
            .mount(&server)
            .await;
        graphql("finalizeAwsCloudAccountProtection")
            .respond_with(data("finalizeAwsCloudAccountProtection", json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = aws::add_account(&client, &spec()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Account 111111111111 already added: account already exists"
        );
    }

    #[tokio::test]
    async fn test_add_account_rejects_unknown_region() {
        let server = MockServer::start().await;
        mount_aws_enums(&server).await;

        graphql("validateAndCreateAwsCloudAccount")
            .respond_with(data("validateAndCreateAwsCloudAccount", initiate_response(json!([]))))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let spec = AwsAccountSpec {
            regions: vec!["EU_NOWHERE_1".to_string()],
            ..spec()
        };
        let err = aws::add_account(&client, &spec).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"EU_NOWHERE_1 not found, valid regions are ["US_EAST_1", "US_WEST_2"]"#
        );
    }

    #[tokio::test]
    async fn test_delete_account_disables_then_initiates() {
        let server = MockServer::start().await;

        graphql("allAwsCloudAccounts")
            .respond_with(data("allAwsCloudAccounts", account_details()))
            .mount(&server)
            .await;
        graphql("startAwsNativeAccountDisableJob")
            .and(body_partial_json(json!({"variables": {"polaris_account_id": "p1"}})))
            .respond_with(data("startAwsNativeAccountDisableJob", json!({"error": "", "jobId": "tc-1"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_taskchain(&server, "SUCCEEDED").await;
        graphql("prepareAwsCloudAccountDeletion")
            .and(body_partial_json(json!({"variables": {"cloud_account_uuid": "p1"}})))
            .respond_with(data(
                "prepareAwsCloudAccountDeletion",
                json!({"cloudFormationUrl": "https://console.aws.amazon.com/cloudformation"}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        graphql("finalizeAwsCloudAccountDeletion")
            .and(body_partial_json(json!({"variables": {"cloud_account_uuid": "p1"}})))
            .respond_with(data(
                "finalizeAwsCloudAccountDeletion",
                json!({"awsChildAccounts": [], "message": "deleted"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let deletion = aws::delete_account(&client, NATIVE_ID).await.unwrap();
        assert_eq!(deletion.polaris_account_id, "p1");
        assert_eq!(
            deletion.stacks,
            vec![StackRemoval {
                stack_name: Some("rubrik-polaris-stack".to_string()),
                region: "us-east-1".to_string(),
            }]
        );
        assert!(deletion.cloud_formation_url.is_some());

        let committed = aws::commit_account_delete(&client, &deletion.polaris_account_id)
            .await
            .unwrap();
        assert_eq!(committed["message"], json!("deleted"));
    }

    #[tokio::test]
    async fn test_delete_account_stops_when_disable_fails() {
        let server = MockServer::start().await;

        graphql("allAwsCloudAccounts")
            .respond_with(data("allAwsCloudAccounts", account_details()))
            .mount(&server)
            .await;
        graphql("startAwsNativeAccountDisableJob")
            .respond_with(data("startAwsNativeAccountDisableJob", json!({"error": "", "jobId": "tc-1"})))
            .mount(&server)
            .await;
        mount_taskchain(&server, "FAILED").await;
        graphql("prepareAwsCloudAccountDeletion")
            .respond_with(data("prepareAwsCloudAccountDeletion", json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = aws::delete_account(&client, NATIVE_ID).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to delete AWS account: Failed to disable account"
        );
    }

    #[tokio::test]
    async fn test_delete_unknown_account() {
        let server = MockServer::start().await;

        graphql("allAwsCloudAccounts")
            .respond_with(data("allAwsCloudAccounts", json!([])))
            .mount(&server)
            .await;
        graphql("startAwsNativeAccountDisableJob")
            .respond_with(data("startAwsNativeAccountDisableJob", json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = aws::delete_account(&client, "999999999999").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to delete AWS account: AWS account 999999999999 is not in Polaris"
        );
    }
}

mod gcp_tests {
    use super::*;

    const PROJECT_ID: &str = "demo-123";

    fn manual() -> GcpProjectSource {
        GcpProjectSource::Manual {
            name: "Demo".to_string(),
            number: 4455667788,
            id: PROJECT_ID.to_string(),
        }
    }

    fn cloud_account(status: &str) -> Value {
        json!([{
            "project": {"id": "rp-1", "name": "Demo", "projectId": PROJECT_ID, "projectNumber": "4455667788"},
            "featureDetail": {"feature": "CLOUD_NATIVE_PROTECTION", "status": status}
        }])
    }

    async fn mount_cloud_account(server: &MockServer, status: &str) {
        graphql("gcpCloudAccountListProjects")
            .and(body_partial_json(json!({"variables": {"search_text": PROJECT_ID}})))
            .respond_with(data("gcpCloudAccountListProjects", cloud_account(status)))
            .mount(server)
            .await;
    }

    async fn mount_native_project(server: &MockServer) {
        graphql("gcpNativeProjectConnection")
            .and(body_partial_json(json!({"variables": {"filter": "4455667788"}})))
            .respond_with(data(
                "gcpNativeProjectConnection",
                json!({
                    "edges": [{"node": {"id": "np-1", "name": "Demo", "nativeId": PROJECT_ID}}],
                    "pageInfo": {"hasNextPage": false, "endCursor": null}
                }),
            ))
            .mount(server)
            .await;
    }

    async fn mount_delete(server: &MockServer, times: u64) {
        graphql("gcpCloudAccountDeleteProjects")
            .and(body_partial_json(json!({"variables": {"native_protection_ids": ["rp-1"]}})))
            .respond_with(data(
                "gcpCloudAccountDeleteProjects",
                json!([{"projectUuid": "rp-1", "success": true, "error": ""}]),
            ))
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_add_manual_project() {
        let server = MockServer::start().await;

        graphql("gcpCloudAccountAddManualAuthProject")
            .and(body_partial_json(json!({"variables": {
                "gcp_native_project_id": PROJECT_ID,
                "gcp_native_project_name": "Demo",
                "gcp_native_project_number": 4455667788u64
            }})))
            .respond_with(data("gcpCloudAccountAddManualAuthProject", json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let added = gcp::add_project(&client, &manual()).await.unwrap();
        assert_eq!(added, json!(true));
    }

    #[tokio::test]
    async fn test_add_project_with_null_result_fails() {
        let server = MockServer::start().await;

        graphql("gcpCloudAccountAddManualAuthProject")
            .respond_with(data("gcpCloudAccountAddManualAuthProject", Value::Null))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = gcp::add_project(&client, &manual()).await.unwrap_err();
        assert_eq!(err.to_string(), "Problem adding GCP Project to Polaris: demo-123");
    }

    #[tokio::test]
    async fn test_add_project_request_error() {
        let server = MockServer::start().await;

        graphql("gcpCloudAccountAddManualAuthProject")
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{"message": "project already exists", "path": ["gcpCloudAccountAddManualAuthProject"]}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = gcp::add_project(&client, &manual()).await.unwrap_err();
        assert_eq!(err.to_string(), "Problem adding GCP Project to Polaris: demo-123");
    }

    #[tokio::test]
    async fn test_add_manual_project_needs_every_field() {
        let server = MockServer::start().await;

        graphql("gcpCloudAccountAddManualAuthProject")
            .respond_with(data("gcpCloudAccountAddManualAuthProject", json!(true)))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let source = GcpProjectSource::Manual {
            name: "Demo".to_string(),
            number: 0,
            id: PROJECT_ID.to_string(),
        };
        let err = gcp::add_project(&client, &source).await.unwrap_err();
        assert_eq!(err.to_string(), "Could not add GCP Project, please check inputs");
    }

    #[tokio::test]
    async fn test_delete_connected_project_disables_first() {
        let server = MockServer::start().await;
        mount_cloud_account(&server, "CONNECTED").await;
        mount_native_project(&server).await;

        graphql("gcpNativeDisableProject")
            .and(body_partial_json(json!({"variables": {
                "rubrik_project_id": "np-1",
                "delete_snapshots": true
            }})))
            .respond_with(data("gcpNativeDisableProject", json!({"taskchainUuid": "tc-1"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_taskchain(&server, "SUCCEEDED").await;
        mount_delete(&server, 1).await;

        let client = client_for(&server);
        let deleted = gcp::delete_project(&client, PROJECT_ID, true).await.unwrap();
        assert_eq!(deleted[0]["success"], json!(true));
    }

    #[tokio::test]
    async fn test_delete_disabled_project_skips_disable() {
        let server = MockServer::start().await;
        mount_cloud_account(&server, "DISABLED").await;

        graphql("gcpNativeDisableProject")
            .respond_with(data("gcpNativeDisableProject", json!({"taskchainUuid": "tc-1"})))
            .expect(0)
            .mount(&server)
            .await;
        mount_delete(&server, 1).await;

        let client = client_for(&server);
        assert!(gcp::delete_project(&client, PROJECT_ID, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_project_in_other_state_is_refused() {
        let server = MockServer::start().await;
        mount_cloud_account(&server, "MISSING_PERMISSIONS").await;
        mount_delete(&server, 0).await;

        let client = client_for(&server);
        let err = gcp::delete_project(&client, PROJECT_ID, false).await.unwrap_err();
        assert_eq!(err.to_string(), "Project demo-123 is MISSING_PERMISSIONS, cannot delete");
    }

    #[tokio::test]
    async fn test_delete_project_when_disable_answers_nothing() {
        let server = MockServer::start().await;
        mount_cloud_account(&server, "CONNECTED").await;
        mount_native_project(&server).await;

        graphql("gcpNativeDisableProject")
            .respond_with(data("gcpNativeDisableProject", Value::Null))
            .mount(&server)
            .await;
        mount_delete(&server, 0).await;

        let client = client_for(&server);
        let err = gcp::delete_project(&client, PROJECT_ID, false).await.unwrap_err();
        assert_eq!(err.to_string(), "Problem disabling protection on project: demo-123");
    }

    #[tokio::test]
    async fn test_delete_project_when_disable_task_fails() {
        let server = MockServer::start().await;
        mount_cloud_account(&server, "CONNECTED").await;
        mount_native_project(&server).await;

        graphql("gcpNativeDisableProject")
            .respond_with(data("gcpNativeDisableProject", json!({"taskchainUuid": "tc-1"})))
            .mount(&server)
            .await;
        mount_taskchain(&server, "FAILED").await;
        mount_delete(&server, 0).await;

        let client = client_for(&server);
        let err = gcp::delete_project(&client, PROJECT_ID, false).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to disable project demo-123");
    }

    #[tokio::test]
    async fn test_delete_unknown_project() {
        let server = MockServer::start().await;

        graphql("gcpCloudAccountListProjects")
            .respond_with(data("gcpCloudAccountListProjects", json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = gcp::delete_project(&client, "nope-1", false).await.unwrap_err();
        assert_eq!(err.to_string(), "Project does not exist in Polaris : nope-1");
    }
}
