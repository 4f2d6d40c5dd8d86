//! Task chain monitoring
//!
//! Asynchronous Polaris operations answer with one or more task chain IDs.
//! These helpers poll the chains until they settle.

use crate::error::{PolarisError, Result};
use crate::polaris::client::PolarisClient;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// States after which a task chain no longer changes
pub const TERMINAL_STATES: &[&str] = &["SUCCEEDED", "FAILED", "CANCELED", "CANCELLED"];

/// Keys under which mutations report their task chains
const TASKCHAIN_KEYS: &[&str] = &["taskchainUuid", "taskchainUuids", "taskchainId", "jobId"];

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

/// Final state of one task chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub taskchain_id: String,
    pub state: String,
    /// Last `taskchain` object seen, `null` if the lookup failed
    pub detail: Value,
}

impl TaskOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == "SUCCEEDED"
    }
}

/// Result of submitting an asynchronous operation
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Accepted; the raw mutation result
    Submitted(Value),
    /// Accepted and waited on
    Completed(Vec<TaskOutcome>),
    /// Polaris refused the request
    Rejected(String),
}

impl Submission {
    pub fn to_value(&self) -> Value {
        match self {
            Submission::Submitted(v) => v.clone(),
            Submission::Completed(outcomes) => json!(outcomes),
            Submission::Rejected(msg) => json!({ "error": msg }),
        }
    }
}

pub fn is_terminal(state: &str) -> bool {
    TERMINAL_STATES.contains(&state)
}

/// The `taskchain` object of a task chain
pub async fn get_task_status(client: &PolarisClient, taskchain_id: &str) -> Result<Value> {
    let info = client
        .query("core_taskchain_status", json!({ "filter": taskchain_id }))
        .await?;
    info.get("taskchain")
        .cloned()
        .ok_or_else(|| PolarisError::NotFound(format!("task chain {} not found", taskchain_id)))
}

/// Task chain IDs found anywhere in a mutation result
pub fn taskchain_ids(response: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    collect_ids(response, &mut ids);
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
    ids
}

fn collect_ids(value: &Value, ids: &mut Vec<String>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_ids(item, ids)),
        Value::Object(map) => {
            for key in TASKCHAIN_KEYS {
                match map.get(*key) {
                    Some(Value::String(id)) if !id.is_empty() => ids.push(id.clone()),
                    Some(Value::Array(items)) => {
                        for item in items {
                            match item {
                                Value::String(id) if !id.is_empty() => ids.push(id.clone()),
                                other => collect_ids(other, ids),
                            }
                        }
                    }
                    Some(nested @ Value::Object(_)) => collect_ids(nested, ids),
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

/// Poll a task chain until it reaches a terminal state
pub async fn wait_for_task(
    client: &PolarisClient,
    taskchain_id: &str,
    options: MonitorOptions,
) -> Result<TaskOutcome> {
    // No deadline when the timeout does not fit in an Instant
    let deadline = Instant::now().checked_add(options.timeout);

    loop {
        let (state, detail) = match get_task_status(client, taskchain_id).await {
            Ok(detail) => {
                let state = detail
                    .get("state")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                (state, detail)
            }
            Err(e) => {
                tracing::warn!("Task chain {} lookup failed: {}", taskchain_id, e);
                ("FAILED".to_string(), Value::Null)
            }
        };

        tracing::debug!("Task chain {} is {}", taskchain_id, state);
        if is_terminal(&state) {
            return Ok(TaskOutcome {
                taskchain_id: taskchain_id.to_string(),
                state,
                detail,
            });
        }

        let past_deadline = match (deadline, Instant::now().checked_add(options.poll_interval)) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(end), Some(next)) => next > end,
        };
        if past_deadline {
            return Err(PolarisError::TaskTimeout {
                id: taskchain_id.to_string(),
                timeout: options.timeout,
            });
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}

/// Wait for several task chains at once
pub async fn wait_for_tasks(
    client: &PolarisClient,
    taskchain_ids: &[String],
    options: MonitorOptions,
) -> Result<Vec<TaskOutcome>> {
    tracing::info!("Monitoring {} task chain(s)", taskchain_ids.len());
    join_all(taskchain_ids.iter().map(|id| wait_for_task(client, id, options)))
        .await
        .into_iter()
        .collect()
}

/// Wrap a mutation result, waiting on its task chains when asked
pub async fn submission(
    client: &PolarisClient,
    response: Value,
    wait: bool,
    options: MonitorOptions,
) -> Result<Submission> {
    if let Some(error) = rejection(&response) {
        return Ok(Submission::Rejected(error));
    }
    if !wait {
        return Ok(Submission::Submitted(response));
    }
    let ids = taskchain_ids(&response);
    Ok(Submission::Completed(wait_for_tasks(client, &ids, options).await?))
}

/// Error carried in a mutation result, either `error` or `errors[0].message`
pub fn rejection(response: &Value) -> Option<String> {
    if let Some(error) = response.get("error").and_then(Value::as_str).filter(|e| !e.is_empty()) {
        return Some(error.to_string());
    }
    let first = response.get("errors")?.as_array()?.first()?;
    match first {
        Value::String(msg) => Some(msg.clone()),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(other.to_string())),
    }
}
