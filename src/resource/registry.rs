//! Resource Registry - Load resource definitions from JSON
//!
//! This module loads all GCP resource definitions from embedded JSON files.
//! File order, then entry order inside each file, is the order in which
//! resource types are listed and removed: dependents come before the
//! resources they depend on.

use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/gke.json"),
    include_str!("../resources/compute.json"),
    include_str!("../resources/storage.json"),
];

/// API family a resource type belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Compute,
    Storage,
    Container,
}

/// Where a resource type lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Compute resource in a zone
    Zonal,
    /// Compute resource in a region
    Regional,
    /// Compute resource without location
    Global,
    /// Project-wide resource of a non-compute API
    Project,
    /// GKE resource addressed by `locations/{location}`
    Location,
}

impl Scope {
    /// Whether listed items carry a location to match against the session region
    pub fn is_located(&self) -> bool {
        matches!(self, Self::Zonal | Self::Regional | Self::Location)
    }
}

fn default_response_path() -> String {
    "items".to_string()
}

fn default_name_field() -> String {
    "name".to_string()
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub key: String,
    pub display_name: String,
    pub service: Service,
    /// REST collection name, e.g. `instances`
    pub collection: String,
    pub scope: Scope,
    #[serde(default = "default_response_path")]
    pub response_path: String,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    /// Delete answers with a long-running operation
    #[serde(default)]
    pub async_delete: bool,
    /// Labels marking resources owned by another system
    #[serde(default)]
    pub protected_labels: Vec<String>,
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<Vec<ResourceDef>> = OnceLock::new();

/// Get every resource definition in registration order
pub fn get_registry() -> &'static [ResourceDef] {
    REGISTRY.get_or_init(|| {
        let mut resources = Vec::new();
        let mut seen = HashSet::new();

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            for def in partial.resources {
                if seen.insert(def.key.clone()) {
                    resources.push(def);
                } else {
                    tracing::warn!("Duplicate resource definition ignored: {}", def.key);
                }
            }
        }

        resources
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().iter().find(|def| def.key == key)
}

/// Get all resource keys in registration order
pub fn get_all_resource_keys() -> Vec<&'static str> {
    get_registry().iter().map(|def| def.key.as_str()).collect()
}
