//! Definition-driven listers
//!
//! One lister per registered resource type, in registration order.

use super::fetcher::{extract_json_value, fetch_resources, item_labels, item_location};
use super::filter::FilterRule;
use super::handle::GcpResource;
use super::registry::{get_registry, get_resource, ResourceDef};
use crate::gcp::client::GcpClient;
use crate::nuke::{Lister, ResourceHandle};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Which resource types take part in a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSelection {
    /// Only these types; empty means all
    pub targets: Vec<String>,
    /// Never these types
    pub excludes: Vec<String>,
}

impl ResourceSelection {
    /// Reject type keys that are not registered
    pub fn validate(&self) -> Result<()> {
        for key in self.targets.iter().chain(self.excludes.iter()) {
            if get_resource(key).is_none() {
                return Err(anyhow::anyhow!(
                    "Unknown resource type '{}'. Use --list-types to see all types.",
                    key
                ));
            }
        }
        Ok(())
    }

    pub fn includes(&self, key: &str) -> bool {
        (self.targets.is_empty() || self.targets.iter().any(|t| t == key))
            && !self.excludes.iter().any(|e| e == key)
    }
}

/// Lists one resource type as described by its definition
pub struct DefinitionLister {
    def: &'static ResourceDef,
    rules: Arc<Vec<FilterRule>>,
    poll_interval: Duration,
}

impl DefinitionLister {
    pub fn new(def: &'static ResourceDef, rules: Arc<Vec<FilterRule>>, poll_interval: Duration) -> Self {
        Self {
            def,
            rules,
            poll_interval,
        }
    }
}

#[async_trait]
impl Lister for DefinitionLister {
    fn resource_type(&self) -> &str {
        &self.def.key
    }

    async fn list(&self, session: &Arc<GcpClient>) -> Result<Vec<ResourceHandle>> {
        let items = fetch_resources(self.def, session).await?;
        let mut resources: Vec<ResourceHandle> = Vec::with_capacity(items.len());

        for item in items {
            let Some(name) = extract_json_value(&item, &self.def.name_field) else {
                tracing::warn!("Skipping {} item without {}", self.def.key, self.def.name_field);
                continue;
            };

            resources.push(Arc::new(GcpResource::new(
                self.def,
                Arc::clone(session),
                name,
                item_location(self.def, &item),
                item_labels(&item),
                Arc::clone(&self.rules),
                self.poll_interval,
            )));
        }

        Ok(resources)
    }
}

/// Build the fixed, ordered lister collection for a run
pub fn listers(
    selection: &ResourceSelection,
    filters: &HashMap<String, Vec<FilterRule>>,
    poll_interval: Duration,
) -> Result<Vec<Box<dyn Lister>>> {
    selection.validate()?;

    let listers = get_registry()
        .iter()
        .filter(|def| selection.includes(&def.key))
        .map(|def| {
            let rules = Arc::new(filters.get(&def.key).cloned().unwrap_or_default());
            Box::new(DefinitionLister::new(def, rules, poll_interval)) as Box<dyn Lister>
        })
        .collect();

    Ok(listers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::registry::get_all_resource_keys;

    #[test]
    fn test_all_types_by_default_in_registry_order() {
        let listers = listers(&ResourceSelection::default(), &HashMap::new(), Duration::ZERO).unwrap();
        let keys: Vec<&str> = listers.iter().map(|l| l.resource_type()).collect();
        assert_eq!(keys, get_all_resource_keys());
    }

    #[test]
    fn test_targets_and_excludes() {
        let selection = ResourceSelection {
            targets: vec!["compute-networks".to_string(), "compute-disks".to_string()],
            excludes: vec!["compute-networks".to_string()],
        };
        let listers = listers(&selection, &HashMap::new(), Duration::ZERO).unwrap();
        let keys: Vec<&str> = listers.iter().map(|l| l.resource_type()).collect();
        assert_eq!(keys, vec!["compute-disks"]);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let selection = ResourceSelection {
            targets: vec!["compute-teapots".to_string()],
            excludes: vec![],
        };
        let err = listers(&selection, &HashMap::new(), Duration::ZERO).err().unwrap();
        assert!(err.to_string().contains("compute-teapots"));
    }
}
