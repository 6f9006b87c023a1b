//! Lightweight sub-task execution.
//!
//! A sub-task is an atomic unit run inline by a parent agent. It never
//! registers with the controller and so does not count against the agent
//! bound.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::behavior::truncate_chars;

const SUB_TASK_LATENCY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubTaskOutcome {
    Success { result: Value },
    Error { error_message: String },
}

impl SubTaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Run one sub-task.
///
/// Objects with an `operation` field are dispatched by name; anything else
/// is echoed back as `Processed_<input>`.
pub async fn execute_sub_task(sub_agent_id: &str, input: &Value) -> SubTaskOutcome {
    debug!(sub_agent_id, input = %truncate_chars(&input.to_string(), 100), "Sub-task started");
    tokio::time::sleep(SUB_TASK_LATENCY).await;

    let outcome = match input.get("operation").and_then(Value::as_str) {
        Some("square") => square(input.get("number").unwrap_or(&Value::from(0))),
        Some(other) => SubTaskOutcome::Success {
            result: Value::String(format!("Unknown operation: {other}")),
        },
        None => {
            let text = match input {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            SubTaskOutcome::Success {
                result: Value::String(format!("Processed_{}", truncate_chars(&text, 50))),
            }
        }
    };

    debug!(sub_agent_id, success = outcome.is_success(), "Sub-task finished");
    outcome
}

fn square(number: &Value) -> SubTaskOutcome {
    if let Some(n) = number.as_i64() {
        return match n.checked_mul(n) {
            Some(sq) => SubTaskOutcome::Success { result: sq.into() },
            None => SubTaskOutcome::Error {
                error_message: format!("square of {n} overflows"),
            },
        };
    }
    match number.as_f64() {
        Some(n) => SubTaskOutcome::Success {
            result: Value::from(n * n),
        },
        None => SubTaskOutcome::Error {
            error_message: format!("number must be numeric, got {number}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn square_operation() {
        let out = execute_sub_task("sub-1", &json!({"operation": "square", "number": 5})).await;
        assert_eq!(out, SubTaskOutcome::Success { result: json!(25) });
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({"status": "success", "result": 25})
        );
    }

    #[tokio::test]
    async fn non_numeric_square_is_error() {
        let out = execute_sub_task("sub-2", &json!({"operation": "square", "number": "x"})).await;
        assert!(!out.is_success());
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["status"], "error");
        assert!(value["error_message"].as_str().unwrap().contains("numeric"));
    }

    #[tokio::test]
    async fn plain_input_is_processed() {
        let out = execute_sub_task("sub-3", &json!("Simple text processing")).await;
        assert_eq!(
            out,
            SubTaskOutcome::Success {
                result: json!("Processed_Simple text processing")
            }
        );
    }

    #[tokio::test]
    async fn unknown_operation_reported() {
        let out = execute_sub_task("sub-4", &json!({"operation": "cube"})).await;
        assert_eq!(
            out,
            SubTaskOutcome::Success {
                result: json!("Unknown operation: cube")
            }
        );
    }
}
