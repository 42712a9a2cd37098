//! Configuration Management
//!
//! Loads the nuke configuration (JSON or YAML) and resolves effective values.

use crate::gcp::auth;
use crate::resource::{FilterRule, ResourceSelection};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default interval between two polls of a long-running operation
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Resource type selection from the config file
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ResourceTypes {
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

/// Nuke configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Project to nuke
    #[serde(default)]
    pub project_id: Option<String>,
    /// Region to nuke, or `all`
    #[serde(default)]
    pub region: Option<String>,
    /// Projects that must never be nuked
    #[serde(default)]
    pub project_blocklist: Vec<String>,
    #[serde(default)]
    pub resource_types: ResourceTypes,
    /// Keep rules per resource type key
    #[serde(default)]
    pub filters: HashMap<String, Vec<FilterRule>>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Stop retrying after this many passes
    #[serde(default)]
    pub max_passes: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: None,
            region: None,
            project_blocklist: Vec::new(),
            resource_types: ResourceTypes::default(),
            filters: HashMap::new(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_passes: None,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gnuke").join("config.json"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Without one, the default path is
    /// used when present, otherwise defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file '{}'", path.display()))?;
        Self::parse(&content, path)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    /// Parse config content; YAML for `.yaml`/`.yml` files, JSON otherwise
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        if is_yaml {
            Ok(serde_yaml::from_str(content)?)
        } else {
            Ok(serde_json::from_str(content)?)
        }
    }

    /// Check filter rules and limits before anything runs
    pub fn validate(&self) -> Result<()> {
        for (key, rules) in &self.filters {
            for rule in rules {
                rule.validate()
                    .with_context(|| format!("Invalid filter for {}", key))?;
            }
        }
        if self.max_passes == Some(0) {
            return Err(anyhow::anyhow!("max_passes must be at least 1"));
        }
        Ok(())
    }

    /// Get effective project (CLI > config > gcloud default)
    pub fn effective_project(&self, cli: Option<&str>, profile: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.project_id.clone())
            .or_else(|| auth::get_default_project(profile))
    }

    /// Get effective region (CLI > config > gcloud default)
    pub fn effective_region(&self, cli: Option<&str>, profile: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.region.clone())
            .or_else(|| auth::get_default_region(profile))
    }

    /// Refuse projects on the blocklist
    pub fn check_project(&self, project: &str) -> Result<()> {
        if self.project_blocklist.iter().any(|p| p == project) {
            return Err(anyhow::anyhow!(
                "Project '{}' is on the blocklist of your config. Aborting.",
                project
            ));
        }
        Ok(())
    }

    /// Resource selection with CLI values added to the configured ones
    pub fn selection(&self, targets: &[String], excludes: &[String]) -> ResourceSelection {
        let targets = if targets.is_empty() {
            self.resource_types.targets.clone()
        } else {
            targets.to_vec()
        };
        let mut all_excludes = self.resource_types.excludes.clone();
        all_excludes.extend(excludes.iter().cloned());

        ResourceSelection {
            targets,
            excludes: all_excludes,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{FilterMatch, MatchKind};

    #[test]
    fn test_parse_json_config() {
        let content = r#"{
            "project_id": "sandbox-project",
            "region": "us-central1",
            "project_blocklist": ["prod-project"],
            "resource_types": {"excludes": ["storage-buckets"]},
            "filters": {
                "compute-networks": ["default", {"type": "prefix", "value": "shared-"}]
            }
        }"#;
        let config = Config::parse(content, Path::new("config.json")).unwrap();

        assert_eq!(config.project_id.as_deref(), Some("sandbox-project"));
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.max_passes, None);
        assert_eq!(
            config.filters["compute-networks"],
            vec![
                FilterRule::Name("default".to_string()),
                FilterRule::Match(FilterMatch {
                    property: "name".to_string(),
                    kind: MatchKind::Prefix,
                    value: "shared-".to_string(),
                }),
            ]
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_yaml_config() {
        let content = "
project_id: sandbox-project
poll_interval_ms: 500
max_passes: 10
filters:
  compute-instances:
    - property: label:keep
      value: \"true\"
";
        let config = Config::parse(content, Path::new("nuke.yaml")).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.max_passes, Some(10));
        assert_eq!(config.filters["compute-instances"].len(), 1);
    }

    #[test]
    fn test_blocklist() {
        let config = Config {
            project_blocklist: vec!["prod-project".to_string()],
            ..Config::default()
        };
        assert!(config.check_project("prod-project").is_err());
        assert!(config.check_project("sandbox-project").is_ok());
    }

    #[test]
    fn test_cli_values_take_precedence() {
        let config = Config {
            project_id: Some("from-config".to_string()),
            region: Some("europe-west1".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.effective_project(Some("from-cli"), None).as_deref(),
            Some("from-cli")
        );
        assert_eq!(
            config.effective_region(None, None).as_deref(),
            Some("europe-west1")
        );
    }

    #[test]
    fn test_selection_merges_excludes() {
        let config = Config {
            resource_types: ResourceTypes {
                targets: vec!["compute-disks".to_string()],
                excludes: vec!["storage-buckets".to_string()],
            },
            ..Config::default()
        };

        let selection = config.selection(&[], &["compute-networks".to_string()]);
        assert_eq!(selection.targets, vec!["compute-disks"]);
        assert_eq!(selection.excludes, vec!["storage-buckets", "compute-networks"]);

        let selection = config.selection(&["compute-instances".to_string()], &[]);
        assert_eq!(selection.targets, vec!["compute-instances"]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = Config {
            max_passes: Some(0),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let err = Config::load(Some(Path::new("/nonexistent/gnuke.json"))).unwrap_err();
        assert!(err.to_string().contains("Unable to read config file"));
    }
}
