//! Global SLA domains

use crate::common::PageArgs;
use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use serde_json::{json, Map, Value};

/// One page of SLA domains
///
/// `filters` are GlobalSlaFilterInput objects; the object types of an
/// `OBJECT_TYPE` filter must be SLAObjectTypeEnum members.
pub async fn list_sla_domains(
    client: &PolarisClient,
    filters: &[Value],
    page: &PageArgs,
    show_protected_object_count: bool,
) -> Result<Value> {
    let mut variables = Map::new();
    page.apply(client, &mut variables, "SLAQuerySortByFieldEnum", "SLAQuerySortByOrderEnum")
        .await?;

    if !filters.is_empty() {
        let supported = client.enum_values("SLAObjectTypeEnum").await?;
        for filter in filters {
            check_object_types(filter, &supported)?;
        }
        variables.insert("filter".to_string(), json!(filters));
    }
    if show_protected_object_count {
        variables.insert("shouldShowProtectedObjectCount".to_string(), json!(true));
    }

    client.query_raw("gps_sla_domain", Value::Object(variables)).await
}

fn check_object_types(filter: &Value, supported: &[String]) -> Result<()> {
    if filter.get("field").and_then(Value::as_str) != Some("OBJECT_TYPE") {
        return Ok(());
    }
    let object_types: Vec<&str> = filter
        .get("objectTypeList")
        .and_then(Value::as_array)
        .map(|types| types.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if object_types.iter().all(|t| supported.iter().any(|s| s == t)) {
        return Ok(());
    }
    Err(PolarisError::validation(format!(
        "'{:?}' is an invalid value for 'object types'. Value must be in {:?}.",
        object_types, supported
    )))
}
