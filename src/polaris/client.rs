//! Polaris Client
//!
//! Main client for the Polaris GraphQL API, combining authentication,
//! the embedded query registry and HTTP functionality.

use super::auth::{BaseUrl, PolarisCredentials};
use super::http::PolarisHttpClient;
use crate::config::{AuthMethod, Settings, DEFAULT_TIMEOUT};
use crate::error::{PolarisError, Result};
use crate::graphql::document::GraphQlDocument;
use crate::graphql::nodes::{dump_nodes, extend_nodes, page_info};
use crate::graphql::registry::get_document;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// A single raw GraphQL execution
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    /// Registry name, also used to derive the operation name
    pub name: String,
    /// Document text replacing the registered one
    pub document: Option<String>,
    pub variables: Value,
    /// Per-call timeout, the client default when unset
    pub timeout: Option<Duration>,
}

impl QueryRequest {
    pub fn new(name: &str, variables: Value) -> Self {
        Self {
            name: name.to_string(),
            variables,
            ..Default::default()
        }
    }

    pub fn with_document(mut self, text: &str) -> Self {
        self.document = Some(text.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Main Polaris client
#[derive(Clone)]
pub struct PolarisClient {
    credentials: PolarisCredentials,
    http: PolarisHttpClient,
    timeout: Duration,
    enum_cache: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl PolarisClient {
    /// Create a client and authenticate immediately
    pub async fn connect(settings: Settings) -> Result<Self> {
        let http = PolarisHttpClient::new(settings.insecure)?;
        let credentials = PolarisCredentials::new(settings.base_url, settings.auth, http.clone());

        let client = Self {
            credentials,
            http,
            timeout: settings.timeout,
            enum_cache: Arc::new(RwLock::new(HashMap::new())),
        };
        client.credentials.get_token().await?;

        tracing::info!("Connected to Polaris at {}", client.base_url());
        Ok(client)
    }

    /// Create a client around a token issued elsewhere
    pub fn with_token(base_url: BaseUrl, token: &str) -> Result<Self> {
        let http = PolarisHttpClient::new(false)?;
        let credentials = PolarisCredentials::new(base_url, AuthMethod::Token(token.to_string()), http.clone());

        Ok(Self {
            credentials,
            http,
            timeout: DEFAULT_TIMEOUT,
            enum_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn base_url(&self) -> &BaseUrl {
        self.credentials.base_url()
    }

    pub fn credentials(&self) -> &PolarisCredentials {
        &self.credentials
    }

    pub fn http(&self) -> &PolarisHttpClient {
        &self.http
    }

    /// Run a registered query and flatten the result, following pages
    pub async fn query(&self, name: &str, variables: Value) -> Result<Value> {
        let document = get_document(name)?;
        let mut variables = object_or_empty(variables);
        document.check_variables(&variables)?;

        let response = self.send(document, &variables, self.timeout).await?;
        let mut nodes = dump_nodes(&response, &document.root_field);

        if !document.is_paginated() {
            return Ok(nodes);
        }

        let mut previous_cursor: Option<String> = None;
        let mut info = page_info(&response, &document.root_field);
        while let Some((true, Some(cursor))) = info {
            if previous_cursor.as_deref() == Some(cursor.as_str()) {
                tracing::warn!("{}: cursor did not advance, stopping pagination", name);
                break;
            }
            tracing::debug!("{}: fetching page after {}", name, cursor);
            set_variable(&mut variables, "after", Value::String(cursor.clone()));
            previous_cursor = Some(cursor);

            let page = self.send(document, &variables, self.timeout).await?;
            extend_nodes(&mut nodes, dump_nodes(&page, &document.root_field));
            info = page_info(&page, &document.root_field);
        }

        Ok(nodes)
    }

    /// Run a registered query and return the full response
    pub async fn query_raw(&self, name: &str, variables: Value) -> Result<Value> {
        self.execute(QueryRequest::new(name, variables)).await
    }

    /// Run a query with an optional document override and timeout
    pub async fn execute(&self, request: QueryRequest) -> Result<Value> {
        let timeout = match request.timeout {
            Some(t) if t.is_zero() => {
                return Err(PolarisError::validation("timeout must be greater than zero."))
            }
            Some(t) => t,
            None => self.timeout,
        };

        let parsed;
        let document = match &request.document {
            Some(text) => {
                parsed = GraphQlDocument::parse(&request.name, text)?;
                &parsed
            }
            None => get_document(&request.name)?,
        };

        let variables = object_or_empty(request.variables);
        document.check_variables(&variables)?;
        self.send(document, &variables, timeout).await
    }

    /// Raw response of the first page with the edges of every later page
    /// appended to the root connection
    pub async fn query_paginated(&self, name: &str, variables: Value) -> Result<Value> {
        let document = get_document(name)?;
        let mut variables = object_or_empty(variables);
        document.check_variables(&variables)?;

        let root = document.root_field.as_str();
        let mut response = self.send(document, &variables, self.timeout).await?;
        let mut info = page_info(&response, root);
        let mut previous_cursor: Option<String> = None;

        while let Some((true, Some(cursor))) = info {
            if previous_cursor.as_deref() == Some(cursor.as_str()) {
                tracing::warn!("{}: cursor did not advance, stopping pagination", name);
                break;
            }
            set_variable(&mut variables, "after", Value::String(cursor.clone()));
            previous_cursor = Some(cursor);

            let mut page = self.send(document, &variables, self.timeout).await?;
            info = page_info(&page, root);

            let more = page
                .pointer_mut(&format!("/data/{}/edges", root))
                .map(Value::take)
                .unwrap_or_else(|| Value::Array(Vec::new()));
            if let Some(edges) = response.pointer_mut(&format!("/data/{}/edges", root)) {
                extend_nodes(edges, more);
            }
            if let (Some(last), Some(slot)) = (
                page.pointer(&format!("/data/{}/pageInfo", root)).cloned(),
                response.pointer_mut(&format!("/data/{}/pageInfo", root)),
            ) {
                *slot = last;
            }
        }

        Ok(response)
    }

    /// Values of a GraphQL enum, cached per client
    pub async fn enum_values(&self, enum_name: &str) -> Result<Vec<String>> {
        {
            let cache = self.enum_cache.read().await;
            if let Some(values) = cache.get(enum_name) {
                return Ok(values.clone());
            }
        }

        let nodes = self
            .query("graphql_enum_values", json!({ "enum_name": enum_name }))
            .await?;
        let values: Vec<String> = nodes
            .as_array()
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        tracing::debug!("Enum {} has {} values", enum_name, values.len());
        self.enum_cache
            .write()
            .await
            .insert(enum_name.to_string(), values.clone());
        Ok(values)
    }

    /// Canonical spelling of `value` in `enum_name`, or a validation error
    pub async fn check_enum(&self, value: &str, field_name: &str, enum_name: &str) -> Result<String> {
        let values = self.enum_values(enum_name).await?;
        match_enum(&values, value, field_name)
    }

    /// [`check_enum`](Self::check_enum) over a list of values
    pub async fn check_enum_list<S: AsRef<str>>(
        &self,
        values: &[S],
        field_name: &str,
        enum_name: &str,
    ) -> Result<Vec<String>> {
        let allowed = self.enum_values(enum_name).await?;
        values
            .iter()
            .map(|v| match_enum(&allowed, v.as_ref(), field_name))
            .collect()
    }

    /// Polaris deployment version
    pub async fn polaris_version(&self) -> Result<String> {
        let version = self.query("core_polaris_version", Value::Null).await?;
        Ok(match version {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    async fn send(&self, document: &GraphQlDocument, variables: &Value, timeout: Duration) -> Result<Value> {
        let mut body = json!({
            "query": document.text,
            "variables": variables,
        });
        if let Some(op) = &document.operation_name {
            body["operationName"] = Value::String(op.clone());
        }

        tracing::debug!(
            "{} {} ({})",
            document.kind.as_str(),
            document.name,
            document.operation_name.as_deref().unwrap_or("anonymous")
        );

        let url = self.base_url().graphql_url();
        let token = self.credentials.get_token().await?;
        match self.http.post_json(&url, Some(&token), &body, Some(timeout)).await {
            Err(e) if e.status_code() == Some(401) => {
                tracing::warn!("{}: token rejected, re-authenticating", document.name);
                let token = self.credentials.refresh_token().await?;
                self.http.post_json(&url, Some(&token), &body, Some(timeout)).await
            }
            other => other,
        }
    }
}

fn object_or_empty(variables: Value) -> Value {
    match variables {
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}

fn set_variable(variables: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = variables {
        map.insert(key.to_string(), value);
    }
}

fn match_enum(allowed: &[String], value: &str, field_name: &str) -> Result<String> {
    if let Some(exact) = allowed.iter().find(|a| a.as_str() == value) {
        return Ok(exact.clone());
    }
    if let Some(folded) = allowed.iter().find(|a| a.eq_ignore_ascii_case(value)) {
        return Ok(folded.clone());
    }
    Err(PolarisError::validation(format!(
        "'{}' is an invalid value for '{}'. Value must be in {:?}.",
        value, field_name, allowed
    )))
}
