//! GraphQL document header parsing
//!
//! Only the operation header and the first root field are inspected; the
//! selection set is sent to Polaris untouched.

use crate::error::{PolarisError, Result};
use serde_json::Value;

/// Operation name carried by every embedded document
pub const OPERATION_PLACEHOLDER: &str = "RubrikPolarisSDKRequest";

/// Prefix of the operation names sent to Polaris
pub const OPERATION_PREFIX: &str = "SdkRust";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
        }
    }
}

/// One `$name: Type = default` entry of an operation header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDef {
    pub name: String,
    /// Named type with list and non-null wrappers removed
    pub base_type: String,
    pub is_list: bool,
    pub non_null: bool,
    pub default: Option<String>,
}

impl VariableDef {
    /// Non-null and without a default value
    pub fn is_required(&self) -> bool {
        self.non_null && self.default.is_none()
    }
}

/// A parsed GraphQL operation
#[derive(Debug, Clone)]
pub struct GraphQlDocument {
    pub name: String,
    pub kind: OperationKind,
    pub operation_name: Option<String>,
    pub variables: Vec<VariableDef>,
    /// Response key of the first root field (alias if present)
    pub root_field: String,
    /// Document text with the placeholder operation name rewritten
    pub text: String,
}

/// `accounts_aws` -> `SdkRustAccountsAws`
pub fn operation_name(name: &str) -> String {
    let camel: String = name
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    format!("{}{}", OPERATION_PREFIX, camel)
}

impl GraphQlDocument {
    /// Parse a document registered under `name`
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        let invalid = |reason: &str| PolarisError::InvalidDocument {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let source: Vec<char> = strip_comments(text).chars().collect();
        let mut pos = 0;

        skip_ws(&source, &mut pos);
        let keyword = read_name(&source, &mut pos);
        let kind = match keyword.as_str() {
            "query" => OperationKind::Query,
            "mutation" => OperationKind::Mutation,
            "" if source.get(pos) == Some(&'{') => OperationKind::Query,
            "subscription" => return Err(invalid("subscriptions are not supported")),
            _ => return Err(invalid("document must start with 'query' or 'mutation'")),
        };

        skip_ws(&source, &mut pos);
        let declared_name = read_name(&source, &mut pos);

        skip_ws(&source, &mut pos);
        let mut variables = Vec::new();
        if source.get(pos) == Some(&'(') {
            let close = matching_close(&source, pos).ok_or_else(|| invalid("unbalanced variable list"))?;
            let inner: String = source[pos + 1..close].iter().collect();
            variables = parse_variable_defs(&inner).map_err(|reason| invalid(&reason))?;
            pos = close + 1;
        }

        // Operation-level directives
        while pos < source.len() && source[pos] != '{' {
            pos += 1;
        }
        if pos >= source.len() {
            return Err(invalid("missing selection set"));
        }
        pos += 1;

        // An alias comes first, so the first name is always the response key
        skip_ws(&source, &mut pos);
        let root_field = read_name(&source, &mut pos);
        if root_field.is_empty() {
            return Err(invalid("empty selection set"));
        }

        let (operation_name, text) = if declared_name == OPERATION_PLACEHOLDER {
            let op = operation_name(name);
            let text = text.replace(OPERATION_PLACEHOLDER, &op);
            (Some(op), text)
        } else if declared_name.is_empty() {
            (None, text.to_string())
        } else {
            (Some(declared_name), text.to_string())
        };

        Ok(Self {
            name: name.to_string(),
            kind,
            operation_name,
            variables,
            root_field,
            text,
        })
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDef> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Whether the document can be paged through with `$after`
    pub fn is_paginated(&self) -> bool {
        self.variable("after").is_some()
    }

    /// Fail if a required variable is missing or null
    pub fn check_variables(&self, variables: &Value) -> Result<()> {
        for def in self.variables.iter().filter(|v| v.is_required()) {
            match variables.get(&def.name) {
                None | Some(Value::Null) => {
                    return Err(PolarisError::validation(format!(
                        "{} field is required.",
                        def.name
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push(c);
            }
            continue;
        }
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '#' => in_comment = true,
            '"' => {
                in_string = true;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn skip_ws(source: &[char], pos: &mut usize) {
    while *pos < source.len() && (source[*pos].is_whitespace() || source[*pos] == ',') {
        *pos += 1;
    }
}

fn read_name(source: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < source.len() && (source[*pos].is_ascii_alphanumeric() || source[*pos] == '_') {
        *pos += 1;
    }
    source[start..*pos].iter().collect()
}

/// Index of the bracket closing the one at `open`, skipping string literals
fn matching_close(source: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in source.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_variable_defs(inner: &str) -> std::result::Result<Vec<VariableDef>, String> {
    let source: Vec<char> = inner.chars().collect();
    let mut pos = 0;
    let mut defs = Vec::new();

    loop {
        skip_ws(&source, &mut pos);
        if pos >= source.len() {
            break;
        }
        if source[pos] != '$' {
            return Err(format!("expected '$' at offset {}", pos));
        }
        pos += 1;
        let name = read_name(&source, &mut pos);
        if name.is_empty() {
            return Err("variable without a name".to_string());
        }

        skip_ws(&source, &mut pos);
        if source.get(pos) != Some(&':') {
            return Err(format!("variable '{}' has no type", name));
        }
        pos += 1;

        let (base_type, is_list, non_null) = parse_type(&source, &mut pos)
            .ok_or_else(|| format!("variable '{}' has an invalid type", name))?;

        skip_ws(&source, &mut pos);
        let default = if source.get(pos) == Some(&'=') {
            pos += 1;
            Some(read_default(&source, &mut pos))
        } else {
            None
        };

        // Variable directives
        skip_ws(&source, &mut pos);
        while pos < source.len() && source[pos] != '$' {
            pos += 1;
        }

        defs.push(VariableDef {
            name,
            base_type,
            is_list,
            non_null,
            default,
        });
    }

    Ok(defs)
}

fn parse_type(source: &[char], pos: &mut usize) -> Option<(String, bool, bool)> {
    skip_ws(source, pos);
    let (base, is_list) = if source.get(*pos) == Some(&'[') {
        *pos += 1;
        let (base, _, _) = parse_type(source, pos)?;
        skip_ws(source, pos);
        if source.get(*pos) != Some(&']') {
            return None;
        }
        *pos += 1;
        (base, true)
    } else {
        let base = read_name(source, pos);
        if base.is_empty() {
            return None;
        }
        (base, false)
    };

    skip_ws(source, pos);
    let non_null = if source.get(*pos) == Some(&'!') {
        *pos += 1;
        true
    } else {
        false
    };
    Some((base, is_list, non_null))
}

fn read_default(source: &[char], pos: &mut usize) -> String {
    let start = *pos;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    while *pos < source.len() {
        let c = source[*pos];
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else {
            match c {
                '"' => in_string = true,
                '[' | '{' | '(' => depth += 1,
                ']' | '}' | ')' => depth = depth.saturating_sub(1),
                '$' | '@' if depth == 0 => break,
                _ => {}
            }
        }
        *pos += 1;
    }

    source[start..*pos]
        .iter()
        .collect::<String>()
        .trim()
        .trim_end_matches(',')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LIST: &str = r#"query RubrikPolarisSDKRequest($first: Int = 20, $after: String, $filter: [GlobalSlaFilterInput!], $sortBy: SLAQuerySortByFieldEnum!) {
  globalSlaConnection(first: $first, after: $after, filter: $filter, sortBy: $sortBy) {
    edges { node { id name } }
    pageInfo { endCursor hasNextPage }
  }
}
"#;

    #[test]
    fn test_operation_name() {
        assert_eq!(operation_name("accounts_aws"), "SdkRustAccountsAws");
        assert_eq!(operation_name("core_sla_list"), "SdkRustCoreSlaList");
    }

    #[test]
    fn test_placeholder_in_leading_comment() {
        let text = "# RubrikPolarisSDKRequest is renamed per query\nquery RubrikPolarisSDKRequest {\n  deploymentVersion\n}\n";
        let doc = GraphQlDocument::parse("core_polaris_version", text).unwrap();
        assert_eq!(doc.operation_name.as_deref(), Some("SdkRustCorePolarisVersion"));
        assert!(doc.text.contains("query SdkRustCorePolarisVersion {"));
        assert!(!doc.text.contains(OPERATION_PLACEHOLDER));
    }

    #[test]
    fn test_parse_header() {
        let doc = GraphQlDocument::parse("core_sla_list", LIST).unwrap();
        assert_eq!(doc.kind, OperationKind::Query);
        assert_eq!(doc.operation_name.as_deref(), Some("SdkRustCoreSlaList"));
        assert!(doc.text.starts_with("query SdkRustCoreSlaList("));
        assert_eq!(doc.root_field, "globalSlaConnection");
        assert_eq!(doc.variables.len(), 4);

        let first = doc.variable("first").unwrap();
        assert_eq!(first.base_type, "Int");
        assert_eq!(first.default.as_deref(), Some("20"));
        assert!(!first.is_required());

        let filter = doc.variable("filter").unwrap();
        assert!(filter.is_list);
        assert!(!filter.non_null);
        assert_eq!(filter.base_type, "GlobalSlaFilterInput");

        assert!(doc.variable("sortBy").unwrap().is_required());
        assert!(doc.is_paginated());
    }

    #[test]
    fn test_alias_is_root_key() {
        let text = "query RubrikPolarisSDKRequest($enum_name: String!) { states: __type(name: $enum_name) { enumValues { name } } }";
        let doc = GraphQlDocument::parse("graphql_enum_values", text).unwrap();
        assert_eq!(doc.root_field, "states");
    }

    #[test]
    fn test_root_without_variables() {
        let text = "query RubrikPolarisSDKRequest {\n  deploymentVersion\n}\n";
        let doc = GraphQlDocument::parse("core_polaris_version", text).unwrap();
        assert!(doc.variables.is_empty());
        assert_eq!(doc.root_field, "deploymentVersion");
    }

    #[test]
    fn test_defaults_with_commas_and_strings() {
        let text = r#"mutation RubrikPolarisSDKRequest($a: [String!] = ["x, y", "z"], $b: Boolean = false) { doThing(a: $a, b: $b) }"#;
        let doc = GraphQlDocument::parse("do_thing", text).unwrap();
        assert_eq!(doc.kind, OperationKind::Mutation);
        assert_eq!(doc.variable("a").unwrap().default.as_deref(), Some(r#"["x, y", "z"]"#));
        assert_eq!(doc.variable("b").unwrap().default.as_deref(), Some("false"));
    }

    #[test]
    fn test_missing_selection_set() {
        let err = GraphQlDocument::parse("broken", "query RubrikPolarisSDKRequest($a: Int)").unwrap_err();
        assert!(matches!(err, PolarisError::InvalidDocument { .. }));
    }

    #[test]
    fn test_comments_are_ignored() {
        let text = "# header comment (with parens)\nquery RubrikPolarisSDKRequest($id: UUID!) {\n  # note\n  cluster(clusterUuid: $id) { name }\n}";
        let doc = GraphQlDocument::parse("cdm_cluster", text).unwrap();
        assert_eq!(doc.root_field, "cluster");
        assert!(doc.variable("id").unwrap().is_required());
    }

    #[test]
    fn test_check_variables() {
        let doc = GraphQlDocument::parse("core_sla_list", LIST).unwrap();
        assert!(doc.check_variables(&json!({"sortBy": "NAME"})).is_ok());
        let err = doc.check_variables(&json!({"sortBy": null})).unwrap_err();
        assert_eq!(err.to_string(), "sortBy field is required.");
        assert!(doc.check_variables(&json!({})).is_err());
    }
}
