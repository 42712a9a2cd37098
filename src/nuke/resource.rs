//! Resource handle and lister contracts
//!
//! A resource handle exposes up to three optional capabilities. Each one is
//! queried on its own, so a type can support any subset of them.

use crate::gcp::client::GcpClient;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Shared handle to one discovered remote resource
pub type ResourceHandle = Arc<dyn Resource>;

/// One discovered remote object and its deletion capability
#[async_trait]
pub trait Resource: fmt::Display + Send + Sync {
    /// Resource type key, e.g. `compute-instances`
    fn resource_type(&self) -> &str;

    /// Trigger removal of the remote object.
    ///
    /// Types that have nothing to delete remotely keep the default, which
    /// completes immediately.
    async fn remove(&self) -> Result<()> {
        Ok(())
    }

    /// Eligibility check, if this type supports one
    fn as_filterable(&self) -> Option<&dyn Filterable> {
        None
    }

    /// Asynchronous completion, if removal of this type is not synchronous
    fn as_waitable(&self) -> Option<&dyn Waitable> {
        None
    }
}

/// Decides whether a resource may be removed. Must not touch the remote object.
pub trait Filterable {
    /// `Err` carries the human-readable reason the resource is kept.
    fn filter(&self) -> Result<()>;
}

/// Blocks until a previously triggered removal has completed
#[async_trait]
pub trait Waitable: Send + Sync {
    async fn wait(&self) -> Result<()>;
}

/// Enumerates every existing resource of one type
#[async_trait]
pub trait Lister: Send + Sync {
    fn resource_type(&self) -> &str;

    async fn list(&self, session: &Arc<GcpClient>) -> Result<Vec<ResourceHandle>>;
}
