//! AppFlows blueprints

use crate::error::Result;
use crate::polaris::client::PolarisClient;
use serde_json::{json, Value};

/// Blueprints whose name matches `name`; the exact match alone when there is one
pub async fn get_blueprints(client: &PolarisClient, name: &str) -> Result<Value> {
    let blueprints = client
        .query(
            "appflows_blueprints_list",
            json!({ "filter": [{ "field": "NAME", "texts": [name] }] }),
        )
        .await?;
    Ok(pick_blueprint(blueprints, name))
}

fn pick_blueprint(blueprints: Value, name: &str) -> Value {
    if name.is_empty() {
        return blueprints;
    }
    let found = blueprints
        .as_array()
        .and_then(|items| items.iter().find(|b| b.get("name").and_then(Value::as_str) == Some(name)))
        .cloned();
    found.unwrap_or(blueprints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_blueprint() {
        let all = json!([{"name": "app"}, {"name": "app-2"}]);
        assert_eq!(pick_blueprint(all.clone(), "app-2"), json!({"name": "app-2"}));
        assert_eq!(pick_blueprint(all.clone(), ""), all);
        assert_eq!(pick_blueprint(all.clone(), "missing"), all);
    }
}
