//! Resource abstraction layer
//!
//! This module provides a data-driven approach to removing GCP resources.
//! Resource definitions are loaded from JSON files at compile time, allowing
//! new resource types to be added without code changes.
//!
//! # Architecture
//!
//! - [`registry`] - Loads resource definitions from embedded JSON, in removal order
//! - [`fetcher`] - Fetches resources from GCP APIs with pagination support
//! - [`dispatch`] - Maps definitions to concrete list, delete and operation URLs
//! - [`filter`] - Configured and built-in keep rules
//! - [`handle`] - The resource handle the nuke engine works on
//! - [`lister`] - One lister per selected resource type
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `gke.json` - GKE clusters
//! - `compute.json` - Compute Engine resources (VMs, disks, load balancing, networks)
//! - `storage.json` - Cloud Storage buckets
//!
//! # Example
//!
//! ```ignore
//! use crate::resource::{listers, ResourceSelection};
//!
//! let listers = listers(&ResourceSelection::default(), &HashMap::new(), Duration::from_secs(2))?;
//! ```

pub mod dispatch;
pub mod fetcher;
pub mod filter;
pub mod handle;
pub mod lister;
pub mod registry;

pub use filter::{FilterMatch, FilterRule, MatchKind};
pub use handle::GcpResource;
pub use lister::{listers, DefinitionLister, ResourceSelection};
pub use registry::{get_all_resource_keys, get_registry, get_resource, ResourceDef, Scope, Service};
