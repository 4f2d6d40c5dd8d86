//! HTTP utilities for Polaris REST and GraphQL calls

use crate::error::{PolarisError, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Turn a status code and a raw body into a decoded payload or an error.
///
/// GraphQL errors win over API error bodies, which win over the HTTP status.
pub fn check_response(status: StatusCode, body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        if !status.is_success() {
            return Err(PolarisError::Http { status });
        }
        return Ok(Value::Null);
    }

    let payload: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            if !status.is_success() {
                tracing::error!("API error: {} - {}", status, sanitize_for_log(body));
                return Err(PolarisError::Http { status });
            }
            return Err(PolarisError::Json(e));
        }
    };

    if let Some(first) = payload
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        tracing::error!("GraphQL error: {}", sanitize_for_log(body));
        return Err(graphql_error(first));
    }

    if let (Some(code), Some(message)) = (
        payload.get("code").and_then(Value::as_u64),
        payload.get("message").and_then(Value::as_str),
    ) {
        if code >= 400 {
            tracing::error!("API error: {} - {}", code, sanitize_for_log(message));
            return Err(PolarisError::Api {
                code: u16::try_from(code).unwrap_or(u16::MAX),
                message: message.to_string(),
            });
        }
    }

    if !status.is_success() {
        tracing::error!("API error: {} - {}", status, sanitize_for_log(body));
        return Err(PolarisError::Http { status });
    }

    Ok(payload)
}

fn graphql_error(error: &Value) -> PolarisError {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let code = match error.pointer("/extensions/code") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    };
    let path = error
        .get("path")
        .map(Value::to_string)
        .unwrap_or_else(|| "[]".to_string());

    PolarisError::GraphQl { message, code, path }
}

/// HTTP client wrapper for Polaris calls
#[derive(Clone)]
pub struct PolarisHttpClient {
    client: Client,
}

impl PolarisHttpClient {
    /// Create a new HTTP client
    pub fn new(insecure: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("rubrik-polaris/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(insecure)
            .build()?;

        Ok(Self { client })
    }

    /// POST a JSON body and decode the JSON reply
    pub async fn post_json(
        &self,
        url: &str,
        token: Option<&str>,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        tracing::debug!("POST {}", url);

        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body);

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        check_response(status, &text)
    }
}

/// Format a Polaris error for display
/// Maps well-known status codes to short hints, otherwise truncates the message
pub fn format_polaris_error(error: &PolarisError) -> String {
    match error.status_code() {
        Some(401) => return "Authentication failed. Check your credentials.".to_string(),
        Some(403) => return "Permission denied. Check the account's Polaris role.".to_string(),
        Some(404) => return "Resource not found.".to_string(),
        Some(429) => return "Rate limit exceeded. Please try again later.".to_string(),
        Some(500) | Some(502) | Some(503) => {
            return "Polaris service temporarily unavailable. Please try again.".to_string()
        }
        _ => {}
    }

    let error_str = error.to_string();
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(160)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.starts_with(&"x".repeat(200)));
        assert!(out.ends_with("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_respects_char_boundaries() {
        let body = "é".repeat(150);
        let out = sanitize_for_log(&body);
        assert!(out.contains("truncated, 300 bytes total"));
    }

    #[test]
    fn test_graphql_errors_take_precedence() {
        let body = json!({
            "errors": [{"message": "boom", "extensions": {"code": 403}, "path": ["clusterConnection"]}],
            "code": 500,
            "message": "ignored"
        })
        .to_string();
        let err = check_response(StatusCode::INTERNAL_SERVER_ERROR, &body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed request to Polaris, got boom(403) on [\"clusterConnection\"]"
        );
    }

    #[test]
    fn test_api_error_body() {
        let body = json!({"code": 401, "message": "JWT validation failed"}).to_string();
        let err = check_response(StatusCode::OK, &body).unwrap_err();
        assert!(matches!(err, PolarisError::Api { code: 401, .. }));
        assert_eq!(format_polaris_error(&err), "Authentication failed. Check your credentials.");
    }

    #[test]
    fn test_status_error_without_body() {
        let err = check_response(StatusCode::BAD_GATEWAY, "").unwrap_err();
        assert_eq!(err.status_code(), Some(502));
    }

    #[test]
    fn test_empty_success_is_null() {
        assert_eq!(check_response(StatusCode::OK, "").unwrap(), Value::Null);
    }

    #[test]
    fn test_empty_errors_array_is_ignored() {
        let body = json!({"data": {"ok": true}, "errors": []}).to_string();
        let value = check_response(StatusCode::OK, &body).unwrap();
        assert_eq!(value["data"]["ok"], json!(true));
    }
}
