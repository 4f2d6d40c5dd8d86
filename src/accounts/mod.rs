//! Cloud accounts: AWS accounts, Azure subscriptions and GCP projects

pub mod aws;
pub mod azure;
pub mod gcp;

use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;

/// Fail unless `value` is a member of `enum_name`
pub(crate) async fn require_member(
    client: &PolarisClient,
    value: &str,
    enum_name: &str,
    noun: &str,
) -> Result<()> {
    let allowed = client.enum_values(enum_name).await?;
    if value.is_empty() || !allowed.iter().any(|a| a == value) {
        return Err(PolarisError::validation(format!(
            "{} not found, valid {} are {:?}",
            value, noun, allowed
        )));
    }
    Ok(())
}
