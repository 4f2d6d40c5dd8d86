//! Response flattening

use serde_json::Value;

/// Flatten a GraphQL response down to the interesting part of `root`.
///
/// - no `data`: the whole response
/// - `null` root: `[]`
/// - boolean root: the boolean
/// - `states`: list of state names
/// - `edges`: list of nodes
/// - anything else: the root value itself
pub fn dump_nodes(response: &Value, root: &str) -> Value {
    let data = match response.get("data") {
        Some(Value::Object(map)) if !map.is_empty() => map,
        _ => return response.clone(),
    };

    let result = match data.get(root).or_else(|| data.values().next()) {
        None | Some(Value::Null) => return Value::Array(Vec::new()),
        Some(v) => v,
    };

    if result.is_boolean() {
        return result.clone();
    }

    if let Some(states) = result.get("states") {
        return Value::Array(
            states
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|s| s.get("name").cloned())
                        .collect()
                })
                .unwrap_or_default(),
        );
    }

    if let Some(edges) = result.get("edges") {
        return Value::Array(
            edges
                .as_array()
                .map(|items| items.iter().filter_map(|e| e.get("node").cloned()).collect())
                .unwrap_or_default(),
        );
    }

    result.clone()
}

/// `(hasNextPage, endCursor)` of the root connection, if it has one
pub fn page_info(response: &Value, root: &str) -> Option<(bool, Option<String>)> {
    let info = response.get("data")?.get(root)?.get("pageInfo")?;
    let has_next = info.get("hasNextPage").and_then(Value::as_bool).unwrap_or(false);
    let cursor = info.get("endCursor").and_then(Value::as_str).map(str::to_string);
    Some((has_next, cursor))
}

/// Append flattened nodes of a later page to the accumulated result
pub fn extend_nodes(acc: &mut Value, page: Value) {
    match (acc, page) {
        (Value::Array(items), Value::Array(more)) => items.extend(more),
        (acc, page) => *acc = page,
    }
}
