//! Configuration Management
//!
//! Resolves connection settings from command-line overrides, `rubrik_*`
//! environment variables and the persistent configuration file.

use crate::error::{PolarisError, Result};
use crate::polaris::auth::BaseUrl;
use crate::polaris::service_account::ServiceAccount;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Prefix for environment variables
pub const ENV_VAR_PREFIX: &str = "rubrik_";

/// Deprecated prefix, still honoured after [`ENV_VAR_PREFIX`]
pub const ENV_VAR_PREFIX_DEPRECATED: &str = "rubrik_polaris_";

/// Root domain used when none is configured
pub const DEFAULT_ROOT_DOMAIN: &str = "my.rubrik.com";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Service account name used when none is configured
pub const DEFAULT_SERVICE_ACCOUNT_NAME: &str = "rubrik-polaris-sdk";

/// Look up a configuration value, in this order: `override_value`,
/// `rubrik_<name>`, `rubrik_polaris_<name>`, `default`.
pub fn conf_val(name: &str, override_value: Option<&str>, default: Option<&str>) -> Option<String> {
    conf_val_from(|key| std::env::var(key).ok(), name, override_value, default)
}

/// Same as [`conf_val`], failing when nothing is found
pub fn require_conf_val(name: &str, override_value: Option<&str>) -> Result<String> {
    conf_val(name, override_value, None).ok_or_else(|| PolarisError::MissingConfig(name.to_string()))
}

/// [`conf_val`] against an arbitrary variable source
pub fn conf_val_from<F>(
    lookup: F,
    name: &str,
    override_value: Option<&str>,
    default: Option<&str>,
) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = override_value {
        return Some(value.to_string());
    }

    lookup(&format!("{}{}", ENV_VAR_PREFIX, name))
        .or_else(|| lookup(&format!("{}{}", ENV_VAR_PREFIX_DEPRECATED, name)))
        .or_else(|| default.map(str::to_string))
}

/// User configuration persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Polaris account domain, e.g. `my-account`
    #[serde(default)]
    pub domain: Option<String>,
    /// Root domain, defaults to `my.rubrik.com`
    #[serde(default)]
    pub root_domain: Option<String>,
    /// Username for password sessions
    #[serde(default)]
    pub username: Option<String>,
    /// Path of a service account JSON file
    #[serde(default)]
    pub service_account_file: Option<PathBuf>,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rubrik-polaris").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Set domain and save
    pub fn set_domain(&mut self, domain: &str) -> Result<()> {
        self.domain = Some(domain.to_string());
        self.save()
    }

    /// Set root domain and save
    pub fn set_root_domain(&mut self, root_domain: &str) -> Result<()> {
        self.root_domain = Some(root_domain.to_string());
        self.save()
    }

    /// Set username and save
    pub fn set_username(&mut self, username: &str) -> Result<()> {
        self.username = Some(username.to_string());
        self.save()
    }

    /// Set service account file and save
    pub fn set_service_account_file(&mut self, path: PathBuf) -> Result<()> {
        self.service_account_file = Some(path);
        self.save()
    }
}

/// Values supplied explicitly by the caller (typically CLI flags)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub domain: Option<String>,
    pub root_domain: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub service_account_file: Option<PathBuf>,
    pub access_token: Option<String>,
    pub insecure: bool,
    pub timeout: Option<Duration>,
}

/// How the client authenticates against Polaris
#[derive(Clone)]
pub enum AuthMethod {
    Password { username: String, password: String },
    ServiceAccount(ServiceAccount),
    Token(String),
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Password { username, .. } => {
                f.debug_struct("Password").field("username", username).finish()
            }
            AuthMethod::ServiceAccount(sa) => f.debug_tuple("ServiceAccount").field(&sa.name).finish(),
            AuthMethod::Token(_) => f.write_str("Token"),
        }
    }
}

/// Fully resolved connection settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: BaseUrl,
    pub auth: AuthMethod,
    pub insecure: bool,
    pub timeout: Duration,
}

impl Settings {
    /// Resolve settings from overrides, the environment and the config file
    pub fn resolve(overrides: &Overrides, config: &Config) -> Result<Self> {
        Self::resolve_with(|key| std::env::var(key).ok(), overrides, config)
    }

    /// Resolve settings against an arbitrary environment source
    pub fn resolve_with<F>(lookup: F, overrides: &Overrides, config: &Config) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str, cli: Option<&str>, file: Option<&str>| {
            conf_val_from(&lookup, name, cli, None).or_else(|| file.map(str::to_string))
        };

        let insecure = overrides.insecure
            || config.insecure
            || get("insecure", None, None)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false);

        let timeout = overrides
            .timeout
            .or_else(|| {
                get("timeout", None, None)
                    .and_then(|v| v.parse::<u64>().ok())
                    .or(config.timeout_secs)
                    .map(Duration::from_secs)
            })
            .unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(PolarisError::validation("timeout must be greater than zero."));
        }

        let service_account_file = overrides
            .service_account_file
            .clone()
            .or_else(|| get("service_account_file", None, None).map(PathBuf::from))
            .or_else(|| config.service_account_file.clone());

        if let Some(path) = service_account_file {
            let account = ServiceAccount::from_json_file(&path)?;
            return Ok(Self {
                base_url: account.base_url(),
                auth: AuthMethod::ServiceAccount(account),
                insecure,
                timeout,
            });
        }

        let domain = get("domain", overrides.domain.as_deref(), config.domain.as_deref())
            .ok_or_else(|| PolarisError::MissingConfig("domain".to_string()))?;
        let root_domain = get(
            "root_domain",
            overrides.root_domain.as_deref(),
            config.root_domain.as_deref(),
        )
        .unwrap_or_else(|| DEFAULT_ROOT_DOMAIN.to_string());
        let base_url = BaseUrl::from_domain(&domain, &root_domain);

        let client_id = get("client_id", None, None);
        let client_secret = get("client_secret", None, None);
        if let (Some(client_id), Some(client_secret)) = (client_id, client_secret) {
            let name = get("service_account_name", None, None)
                .unwrap_or_else(|| DEFAULT_SERVICE_ACCOUNT_NAME.to_string());
            let account = ServiceAccount::new(&name, &client_id, &client_secret, &base_url.access_token_uri());
            return Ok(Self {
                base_url,
                auth: AuthMethod::ServiceAccount(account),
                insecure,
                timeout,
            });
        }

        let username = get("username", overrides.username.as_deref(), config.username.as_deref());
        let password = get("password", overrides.password.as_deref(), None);
        if let (Some(username), Some(password)) = (username, password) {
            return Ok(Self {
                base_url,
                auth: AuthMethod::Password { username, password },
                insecure,
                timeout,
            });
        }

        if let Some(token) = get("access_token", overrides.access_token.as_deref(), None) {
            return Ok(Self {
                base_url,
                auth: AuthMethod::Token(token),
                insecure,
                timeout,
            });
        }

        Err(PolarisError::MissingCredentials(
            "pass a service account, client_id/client_secret or username/password, directly or through the environment"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_conf_val_precedence() {
        let lookup = env(&[("rubrik_domain", "new"), ("rubrik_polaris_domain", "old")]);
        assert_eq!(conf_val_from(&lookup, "domain", Some("cli"), None).as_deref(), Some("cli"));
        assert_eq!(conf_val_from(&lookup, "domain", None, None).as_deref(), Some("new"));

        let lookup = env(&[("rubrik_polaris_domain", "old")]);
        assert_eq!(conf_val_from(&lookup, "domain", None, None).as_deref(), Some("old"));

        let lookup = env(&[]);
        assert_eq!(conf_val_from(&lookup, "domain", None, Some("dflt")).as_deref(), Some("dflt"));
        assert_eq!(conf_val_from(&lookup, "domain", None, None), None);
    }

    #[test]
    fn test_resolve_password_settings() {
        let lookup = env(&[
            ("rubrik_domain", "acme"),
            ("rubrik_username", "admin"),
            ("rubrik_password", "secret"),
        ]);
        let settings = Settings::resolve_with(lookup, &Overrides::default(), &Config::default()).unwrap();
        assert_eq!(settings.base_url.as_str(), "https://acme.my.rubrik.com/api");
        assert!(matches!(settings.auth, AuthMethod::Password { ref username, .. } if username == "admin"));
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
        assert!(!settings.insecure);
    }

    #[test]
    fn test_resolve_prefers_client_credentials() {
        let lookup = env(&[
            ("rubrik_domain", "acme"),
            ("rubrik_root_domain", "example.com"),
            ("rubrik_client_id", "client|abc"),
            ("rubrik_client_secret", "shh"),
            ("rubrik_username", "admin"),
            ("rubrik_password", "secret"),
        ]);
        let settings = Settings::resolve_with(lookup, &Overrides::default(), &Config::default()).unwrap();
        match settings.auth {
            AuthMethod::ServiceAccount(sa) => {
                assert_eq!(sa.client_id, "client|abc");
                assert_eq!(sa.access_token_uri, "https://acme.example.com/api/client_token");
            }
            other => panic!("unexpected auth method {:?}", other),
        }
    }

    #[test]
    fn test_resolve_uses_config_file_domain() {
        let config = Config {
            domain: Some("from-file".to_string()),
            timeout_secs: Some(5),
            ..Config::default()
        };
        let lookup = env(&[("rubrik_access_token", "tok")]);
        let settings = Settings::resolve_with(lookup, &Overrides::default(), &config).unwrap();
        assert_eq!(settings.base_url.as_str(), "https://from-file.my.rubrik.com/api");
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert!(matches!(settings.auth, AuthMethod::Token(_)));
    }

    #[test]
    fn test_resolve_rejects_zero_timeout() {
        let lookup = env(&[("rubrik_domain", "acme"), ("rubrik_access_token", "tok"), ("rubrik_timeout", "0")]);
        let err = Settings::resolve_with(lookup, &Overrides::default(), &Config::default()).unwrap_err();
        assert_eq!(err.to_string(), "timeout must be greater than zero.");

        let overrides = Overrides {
            timeout: Some(Duration::ZERO),
            ..Overrides::default()
        };
        let lookup = env(&[("rubrik_domain", "acme"), ("rubrik_access_token", "tok")]);
        assert!(Settings::resolve_with(lookup, &overrides, &Config::default()).is_err());

        let config = Config {
            timeout_secs: Some(0),
            ..Config::default()
        };
        let lookup = env(&[("rubrik_domain", "acme"), ("rubrik_access_token", "tok")]);
        assert!(Settings::resolve_with(lookup, &Overrides::default(), &config).is_err());
    }

    #[test]
    fn test_resolve_missing_domain() {
        let err = Settings::resolve_with(env(&[]), &Overrides::default(), &Config::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing configuration: rubrik_domain not defined in the environment."
        );
    }

    #[test]
    fn test_resolve_missing_credentials() {
        let lookup = env(&[("rubrik_domain", "acme")]);
        let err = Settings::resolve_with(lookup, &Overrides::default(), &Config::default()).unwrap_err();
        assert!(matches!(err, PolarisError::MissingCredentials(_)));
    }

    #[test]
    fn test_config_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            domain: Some("acme".to_string()),
            insecure: true,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.domain.as_deref(), Some("acme"));
        assert!(loaded.insecure);
    }

    #[test]
    fn test_config_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json"));
        assert!(loaded.domain.is_none());
    }
}
