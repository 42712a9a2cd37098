//! GCP Projects
//!
//! Looks up the target project before anything is listed, so a bad project
//! or unusable credentials fail the run up front.

use super::client::GcpClient;
use anyhow::{Context, Result};
use serde_json::Value;

/// Project information
#[derive(Debug, Clone)]
pub struct Project {
    pub project_id: String,
    pub name: String,
    pub project_number: String,
    pub lifecycle_state: String,
}

impl From<&Value> for Project {
    fn from(value: &Value) -> Self {
        Self {
            project_id: value
                .get("projectId")
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string(),
            name: value
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string(),
            project_number: value
                .get("projectNumber")
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string(),
            lifecycle_state: value
                .get("lifecycleState")
                .and_then(|v| v.as_str())
                .unwrap_or("UNKNOWN")
                .to_string(),
        }
    }
}

impl Project {
    pub fn is_active(&self) -> bool {
        self.lifecycle_state == "ACTIVE"
    }
}

/// Fetch the session project and make sure it can be worked on
pub async fn describe_project(client: &GcpClient) -> Result<Project> {
    let url = client.resourcemanager_url(&format!("projects/{}", client.project_id));
    let response = client
        .get(&url)
        .await
        .with_context(|| format!("Unable to access project '{}'", client.project_id))?;

    let project = Project::from(&response);
    if !project.is_active() {
        return Err(anyhow::anyhow!(
            "Project '{}' is not active (state: {})",
            client.project_id,
            project.lifecycle_state
        ));
    }

    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_from_value() {
        let project = Project::from(&json!({
            "projectId": "sandbox-project",
            "name": "Sandbox",
            "projectNumber": "123456789012",
            "lifecycleState": "DELETE_REQUESTED"
        }));
        assert_eq!(project.project_id, "sandbox-project");
        assert_eq!(project.name, "Sandbox");
        assert!(!project.is_active());
    }
}
