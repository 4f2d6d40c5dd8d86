//! Service accounts and appliance tokens

use super::auth::BaseUrl;
use super::http::PolarisHttpClient;
use crate::config::{conf_val, DEFAULT_ROOT_DOMAIN};
use crate::error::{PolarisError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// A Polaris service account, as downloaded from the Polaris UI
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub access_token_uri: String,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("name", &self.name)
            .field("client_id", &self.client_id)
            .field("access_token_uri", &self.access_token_uri)
            .finish_non_exhaustive()
    }
}

/// Session issued by a CDM appliance for a service account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplianceToken {
    pub id: String,
    pub token: String,
    pub expiration: String,
}

/// Explicit values for [`ServiceAccount::from_env`]
#[derive(Debug, Clone, Default)]
pub struct ServiceAccountOverrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub domain: Option<String>,
    pub root_domain: Option<String>,
}

impl ServiceAccount {
    pub fn new(name: &str, client_id: &str, client_secret: &str, access_token_uri: &str) -> Self {
        Self {
            name: name.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            access_token_uri: access_token_uri.to_string(),
        }
    }

    /// Build from the JSON document Polaris hands out
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Build from a JSON file, `~` is expanded
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let path = expand_home(path);
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Build from `rubrik_*` environment variables and overrides
    pub fn from_env(name: &str, overrides: &ServiceAccountOverrides) -> Result<Self> {
        let require = |key: &str, value: Option<&str>| {
            conf_val(key, value, None).ok_or_else(|| PolarisError::MissingConfig(key.to_string()))
        };

        let domain = require("domain", overrides.domain.as_deref())?;
        let root_domain = conf_val("root_domain", overrides.root_domain.as_deref(), Some(DEFAULT_ROOT_DOMAIN))
            .unwrap_or_else(|| DEFAULT_ROOT_DOMAIN.to_string());
        let base_url = BaseUrl::from_domain(&domain, &root_domain);

        Ok(Self::new(
            name,
            &require("client_id", overrides.client_id.as_deref())?,
            &require("client_secret", overrides.client_secret.as_deref())?,
            &base_url.access_token_uri(),
        ))
    }

    pub fn base_url(&self) -> BaseUrl {
        BaseUrl::from_access_token_uri(&self.access_token_uri)
    }

    /// Exchange the client credentials for a Polaris access token
    pub async fn get_token(&self, http: &PolarisHttpClient) -> Result<String> {
        let body = json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "name": self.name,
        });
        let session = http.post_json(&self.access_token_uri, None, &body, None).await?;

        let returned_id = session.get("client_id").and_then(Value::as_str);
        if returned_id != Some(self.client_id.as_str()) {
            return Err(PolarisError::Authentication(format!(
                "client_token response is for client '{}', expected '{}'",
                returned_id.unwrap_or_default(),
                self.client_id
            )));
        }

        session
            .get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PolarisError::Authentication("Authentication failed!".to_string()))
    }

    /// Create a session on a registered CDM appliance
    pub async fn get_appliance_token(
        &self,
        http: &PolarisHttpClient,
        appliance_uuid: &str,
    ) -> Result<ApplianceToken> {
        let body = json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "cluster_uuid": appliance_uuid,
        });
        let url = format!("{}/cdm_client_token", self.base_url());
        let response = http.post_json(&url, None, &body, None).await?;

        let session = response
            .get("session")
            .cloned()
            .ok_or_else(|| PolarisError::Authentication("cdm_client_token response has no session".to_string()))?;
        Ok(serde_json::from_value(session)?)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map(|home| home.join(rest)).unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> Value {
        json!({
            "name": "my service account",
            "client_id": "client|rjSOLdenk7gtFWSnSiSgX4G1SprdkF6I",
            "client_secret": "qzY2TtYxPB0WYvqviWtHvK2w5P3wvQ39",
            "access_token_uri": "https://my-account.my.rubrik.com/api/client_token"
        })
    }

    #[test]
    fn test_from_json() {
        let sa = ServiceAccount::from_json(&sample()).unwrap();
        assert_eq!(sa.name, "my service account");
        assert_eq!(sa.base_url().as_str(), "https://my-account.my.rubrik.com/api");
    }

    #[test]
    fn test_from_json_missing_field() {
        let mut value = sample();
        value.as_object_mut().unwrap().remove("client_secret");
        assert!(ServiceAccount::from_json(&value).is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", sample()).unwrap();
        let sa = ServiceAccount::from_json_file(file.path()).unwrap();
        assert_eq!(sa.client_id, "client|rjSOLdenk7gtFWSnSiSgX4G1SprdkF6I");
    }

    #[test]
    fn test_debug_hides_secret() {
        let sa = ServiceAccount::from_json(&sample()).unwrap();
        assert!(!format!("{:?}", sa).contains("qzY2"));
    }
}
