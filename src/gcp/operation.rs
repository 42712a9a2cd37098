//! Long-running operations
//!
//! Compute Engine and GKE answer a delete with an operation that has to be
//! polled until it reports `DONE`.

use super::client::GcpClient;
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;

/// Snapshot of a long-running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub status: String,
    pub error: Option<String>,
}

impl Operation {
    /// Parse a Compute Engine or GKE operation resource
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.to_string();
        let status = value
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("PENDING")
            .to_string();

        Some(Self {
            name,
            status,
            error: operation_error(value),
        })
    }

    pub fn is_done(&self) -> bool {
        self.status == "DONE"
    }
}

/// Error text of an operation, if it failed
fn operation_error(value: &Value) -> Option<String> {
    let error = value.get("error")?;

    // Compute: {"error": {"errors": [{"code": ..., "message": ...}]}}
    if let Some(errors) = error.get("errors").and_then(|v| v.as_array()) {
        let messages: Vec<&str> = errors
            .iter()
            .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
            .collect();
        if !messages.is_empty() {
            return Some(messages.join("; "));
        }
    }

    // GKE: {"error": {"code": ..., "message": ...}}
    if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
        return Some(message.to_string());
    }

    value
        .get("statusMessage")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .or_else(|| Some("operation failed".to_string()))
}

/// Poll `url` until the operation is done. There is no deadline.
pub async fn wait_for_operation(client: &GcpClient, url: &str, interval: Duration) -> Result<()> {
    let mut polls: u32 = 0;

    loop {
        let response = client.get(url).await.context("Failed to poll operation")?;
        let operation = Operation::from_value(&response)
            .with_context(|| format!("Unexpected operation response from {}", url))?;
        polls += 1;

        if operation.is_done() {
            tracing::debug!("Operation {} done after {} polls", operation.name, polls);
            return match operation.error {
                Some(message) => Err(anyhow::anyhow!(
                    "operation {} failed: {}",
                    operation.name,
                    message
                )),
                None => Ok(()),
            };
        }

        tracing::trace!("Operation {} is {}", operation.name, operation.status);
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_running_compute_operation() {
        let op = Operation::from_value(&json!({
            "name": "operation-123",
            "status": "RUNNING",
            "operationType": "delete"
        }))
        .unwrap();
        assert!(!op.is_done());
        assert_eq!(op.error, None);
    }

    #[test]
    fn test_failed_compute_operation() {
        let op = Operation::from_value(&json!({
            "name": "operation-456",
            "status": "DONE",
            "error": {"errors": [
                {"code": "RESOURCE_IN_USE_BY_ANOTHER_RESOURCE", "message": "disk is in use by vm-1"}
            ]}
        }))
        .unwrap();
        assert!(op.is_done());
        assert_eq!(op.error.as_deref(), Some("disk is in use by vm-1"));
    }

    #[test]
    fn test_failed_gke_operation() {
        let op = Operation::from_value(&json!({
            "name": "operation-789",
            "status": "DONE",
            "error": {"code": 9, "message": "cluster is being upgraded"}
        }))
        .unwrap();
        assert_eq!(op.error.as_deref(), Some("cluster is being upgraded"));
    }

    #[test]
    fn test_operation_without_name_is_rejected() {
        assert_eq!(Operation::from_value(&json!({"status": "DONE"})), None);
        assert_eq!(Operation::from_value(&Value::Null), None);
    }
}
