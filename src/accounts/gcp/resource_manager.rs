//! Cloud Resource Manager v1, authenticated as a GCP service account

use crate::error::{PolarisError, Result};
use crate::polaris::http::sanitize_for_log;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::Client;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

pub const RESOURCE_MANAGER_URL: &str = "https://cloudresourcemanager.googleapis.com/v1";

/// Default scopes for GCP API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

#[derive(Clone)]
pub struct ResourceManager {
    provider: Arc<dyn TokenProvider>,
    http: Client,
    base_url: String,
}

impl ResourceManager {
    /// Authenticate with a service account key file
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let account = CustomServiceAccount::from_file(path)
            .map_err(|e| PolarisError::Gcp(format!("Failed to load service account key: {}", e)))?;
        let http = Client::builder()
            .user_agent(concat!("rubrik-polaris/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            provider: Arc::new(account),
            http,
            base_url: RESOURCE_MANAGER_URL.to_string(),
        })
    }

    async fn token(&self) -> Result<String> {
        let token = self
            .provider
            .token(DEFAULT_SCOPES)
            .await
            .map_err(|e| PolarisError::Gcp(format!("Failed to get access token: {}", e)))?;
        Ok(token.as_str().to_string())
    }

    /// The subset of `permissions` the caller holds on a project
    pub async fn test_iam_permissions(&self, project_id: &str, permissions: &[String]) -> Result<Vec<String>> {
        let url = format!("{}/projects/{}:testIamPermissions", self.base_url, project_id);
        let response = self.post(&url, &json!({ "permissions": permissions })).await?;
        Ok(response
            .get("permissions")
            .and_then(Value::as_array)
            .map(|p| p.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default())
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Value> {
        self.get(&format!("{}/projects/{}", self.base_url, project_id)).await
    }

    pub async fn get_organization(&self, organization_id: &str) -> Result<Value> {
        self.get(&format!("{}/organizations/{}", self.base_url, organization_id))
            .await
    }

    async fn get(&self, url: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        let token = self.token().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        decode(response).await
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        tracing::debug!("POST {}", url);
        let token = self.token().await?;
        let response = self.http.post(url).bearer_auth(token).json(body).send().await?;
        decode(response).await
    }
}

async fn decode(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        tracing::error!("GCP API error: {} - {}", status, sanitize_for_log(&body));
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default();
        return Err(PolarisError::Gcp(format!("{} {}", status.as_u16(), message).trim().to_string()));
    }

    if body.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

/// Whether a Resource Manager error is a permission failure
pub fn is_permission_error(error: &PolarisError) -> bool {
    match error {
        PolarisError::Gcp(message) => message.starts_with("403") || message.to_lowercase().contains("permission"),
        _ => false,
    }
}
