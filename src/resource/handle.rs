//! GCP resource handle
//!
//! One listed GCP object. Filterable through the configured rules, removable
//! with a DELETE, and Waitable when its type deletes asynchronously.

use super::dispatch;
use super::filter::{self, FilterRule};
use super::registry::ResourceDef;
use crate::gcp::client::GcpClient;
use crate::gcp::http::is_not_found;
use crate::gcp::operation::{wait_for_operation, Operation};
use crate::nuke::{Filterable, Resource, Waitable};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct GcpResource {
    def: &'static ResourceDef,
    client: Arc<GcpClient>,
    name: String,
    location: Option<String>,
    labels: BTreeMap<String, String>,
    rules: Arc<Vec<FilterRule>>,
    poll_interval: Duration,
    /// Operation URL of the last triggered delete
    operation: Mutex<Option<String>>,
}

impl GcpResource {
    pub fn new(
        def: &'static ResourceDef,
        client: Arc<GcpClient>,
        name: String,
        location: Option<String>,
        labels: BTreeMap<String, String>,
        rules: Arc<Vec<FilterRule>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            def,
            client,
            name,
            location,
            labels,
            rules,
            poll_interval,
            operation: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    fn set_operation(&self, url: Option<String>) {
        *self.operation.lock().unwrap_or_else(|e| e.into_inner()) = url;
    }

    fn pending_operation(&self) -> Option<String> {
        self.operation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl fmt::Display for GcpResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}/{}", location, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[async_trait]
impl Resource for GcpResource {
    fn resource_type(&self) -> &str {
        &self.def.key
    }

    async fn remove(&self) -> Result<()> {
        self.set_operation(None);

        let response = match dispatch::execute_delete(
            self.def,
            &self.client,
            &self.name,
            self.location.as_deref(),
        )
        .await
        {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => {
                tracing::debug!("{} {} is already gone", self.def.key, self);
                return Ok(());
            },
            Err(e) => return Err(e),
        };

        if !self.def.async_delete {
            return Ok(());
        }

        let operation = Operation::from_value(&response)
            .with_context(|| format!("Delete of {} returned no operation", self.name))?;
        if operation.is_done() {
            if let Some(message) = operation.error {
                return Err(anyhow::anyhow!("operation {} failed: {}", operation.name, message));
            }
            return Ok(());
        }

        let url = dispatch::operation_url(
            self.def,
            &self.client,
            self.location.as_deref(),
            &operation.name,
        )?;
        self.set_operation(Some(url));
        Ok(())
    }

    fn as_filterable(&self) -> Option<&dyn Filterable> {
        Some(self)
    }

    fn as_waitable(&self) -> Option<&dyn Waitable> {
        if self.def.async_delete {
            Some(self)
        } else {
            None
        }
    }
}

impl Filterable for GcpResource {
    fn filter(&self) -> Result<()> {
        filter::check(self.def, &self.name, &self.labels, &self.rules)
    }
}

#[async_trait]
impl Waitable for GcpResource {
    async fn wait(&self) -> Result<()> {
        let Some(url) = self.pending_operation() else {
            return Ok(());
        };

        wait_for_operation(&self.client, &url, self.poll_interval).await
    }
}
