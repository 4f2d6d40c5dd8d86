//! Sonar: sensitive data discovery

pub mod csv;
pub mod object;
pub mod policy;
pub mod scan;

use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use serde_json::Value;

/// `filters.fileType` must be a FileCountTypeEnum member; a missing one is
/// accepted unless `required`
pub(crate) async fn check_file_type(client: &PolarisClient, filters: &Value, required: bool) -> Result<()> {
    let file_type = filters.get("fileType").and_then(Value::as_str).filter(|t| !t.is_empty());
    if file_type.is_none() && !required {
        return Ok(());
    }
    let allowed = client.enum_values("FileCountTypeEnum").await?;
    match file_type {
        Some(t) if allowed.iter().any(|a| a == t) => Ok(()),
        other => Err(PolarisError::validation(format!(
            "'{}' is an invalid value for 'file type'. Value must be in {:?}.",
            other.unwrap_or("None"),
            allowed
        ))),
    }
}
