//! Nuke Orchestrator
//!
//! Moves every discovered resource through scan, filter, remove and wait,
//! feeding failures back into the queue until none remain.

use super::event::{EventSink, ReasonKind, ResourceEvent};
use super::resource::{Lister, Resource, ResourceHandle};
use crate::gcp::client::GcpClient;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::{self, JoinSet};

/// Run-wide switches consumed by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NukeParameters {
    /// Actually call `remove()`. Off means every queued resource is only reported.
    pub no_dry_run: bool,
    /// Re-queue failed resources until none are left
    pub retry: bool,
    /// Wait for asynchronous removals to complete
    pub wait: bool,
    /// Stop retrying after this many remove/wait passes. `None` retries forever.
    pub max_passes: Option<u32>,
}

impl Default for NukeParameters {
    fn default() -> Self {
        Self {
            no_dry_run: false,
            retry: true,
            wait: true,
            max_passes: None,
        }
    }
}

/// Pipeline position of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Scanning,
    Filtering,
    Removing,
    Waiting,
    Retrying,
    Done,
}

/// The five disjoint lifecycle collections
#[derive(Default)]
pub struct Buckets {
    pub queue: Vec<ResourceHandle>,
    pub waiting: Vec<ResourceHandle>,
    pub skipped: Vec<ResourceHandle>,
    pub failed: Vec<ResourceHandle>,
    pub finished: Vec<ResourceHandle>,
}

impl Buckets {
    /// Number of handles across all buckets
    pub fn total(&self) -> usize {
        self.queue.len()
            + self.waiting.len()
            + self.skipped.len()
            + self.failed.len()
            + self.finished.len()
    }
}

impl fmt::Debug for Buckets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buckets")
            .field("queue", &self.queue.len())
            .field("waiting", &self.waiting.len())
            .field("skipped", &self.skipped.len())
            .field("failed", &self.failed.len())
            .field("finished", &self.finished.len())
            .finish()
    }
}

/// Final (or intermediate) counts of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub finished: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Remove/wait passes executed so far
    pub passes: u32,
}

impl Summary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} finished, {} failed, {} skipped",
            self.finished, self.failed, self.skipped
        )
    }
}

/// Orchestrator state for one run
pub struct Nuke {
    params: NukeParameters,
    session: Arc<GcpClient>,
    listers: Vec<Box<dyn Lister>>,
    sink: Arc<dyn EventSink>,
    buckets: Buckets,
    stage: Stage,
    passes: u32,
}

impl Nuke {
    pub fn new(
        params: NukeParameters,
        session: Arc<GcpClient>,
        listers: Vec<Box<dyn Lister>>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            params,
            session,
            listers,
            sink,
            buckets: Buckets::default(),
            stage: Stage::Idle,
            passes: 0,
        }
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn summary(&self) -> Summary {
        Summary {
            finished: self.buckets.finished.len(),
            failed: self.buckets.failed.len(),
            skipped: self.buckets.skipped.len(),
            passes: self.passes,
        }
    }

    /// Execute the whole pipeline.
    ///
    /// Only scan failures are returned as errors. Per-resource failures end up
    /// in the `failed` count of the summary.
    pub async fn run(&mut self) -> Result<Summary> {
        self.buckets.queue = self.scan().await?;
        tracing::info!("Scan complete: {} resources found", self.buckets.queue.len());

        self.filter_queue();
        self.handle_queue().await;
        self.wait().await;
        self.passes += 1;

        if self.params.retry {
            while !self.buckets.failed.is_empty() {
                if let Some(max) = self.params.max_passes {
                    if self.passes >= max {
                        tracing::warn!(
                            "Giving up after {} passes with {} failed resources",
                            self.passes,
                            self.buckets.failed.len()
                        );
                        break;
                    }
                }

                let summary = self.summary();
                tracing::info!("Retrying: {}", summary);
                self.sink.retrying(&summary);
                self.retry().await;
            }
        }

        self.set_stage(Stage::Done);
        let summary = self.summary();
        tracing::info!("Nuke complete: {} after {} passes", summary, summary.passes);
        Ok(summary)
    }

    /// Run every registered lister in order. The first error aborts the scan.
    pub async fn scan(&mut self) -> Result<Vec<ResourceHandle>> {
        self.set_stage(Stage::Scanning);
        let mut result = Vec::new();

        for lister in &self.listers {
            let resources = lister
                .list(&self.session)
                .await
                .with_context(|| format!("Failed to list {}", lister.resource_type()))?;

            tracing::debug!("{}: {} resources", lister.resource_type(), resources.len());
            result.extend(resources);
        }

        Ok(result)
    }

    /// Move every queued resource rejected by its own filter to `skipped`
    pub fn filter_queue(&mut self) {
        self.set_stage(Stage::Filtering);
        let queue = std::mem::take(&mut self.buckets.queue);

        for resource in queue {
            let verdict = match resource.as_filterable() {
                Some(checker) => checker.filter(),
                None => Ok(()),
            };

            match verdict {
                Ok(()) => self.buckets.queue.push(resource),
                Err(reason) => {
                    self.emit(resource.as_ref(), ReasonKind::Skip, &format!("{reason:#}"));
                    self.buckets.skipped.push(resource);
                },
            }
        }
    }

    /// Remove queued resources one at a time, in queue order
    pub async fn handle_queue(&mut self) {
        self.set_stage(Stage::Removing);
        let queue = std::mem::take(&mut self.buckets.queue);

        for resource in queue {
            if !self.params.no_dry_run {
                self.emit(resource.as_ref(), ReasonKind::Success, "would remove");
                self.buckets.skipped.push(resource);
                continue;
            }

            match resource.remove().await {
                Ok(()) => {
                    self.emit(resource.as_ref(), ReasonKind::RemoveTriggered, "triggered remove");
                    self.buckets.waiting.push(resource);
                },
                Err(e) => {
                    self.emit(resource.as_ref(), ReasonKind::Error, &format!("{e:#}"));
                    self.buckets.failed.push(resource);
                },
            }
        }
    }

    /// Wait for every triggered removal concurrently and sort the outcomes
    /// into `finished` and `failed`.
    pub async fn wait(&mut self) {
        self.set_stage(Stage::Waiting);
        let waiting = std::mem::take(&mut self.buckets.waiting);

        if !self.params.wait {
            self.buckets.finished.extend(waiting);
            return;
        }

        let mut tasks = JoinSet::new();
        let mut pending: HashMap<task::Id, ResourceHandle> = HashMap::new();

        for resource in waiting {
            if resource.as_waitable().is_none() {
                self.buckets.finished.push(resource);
                continue;
            }

            self.emit(resource.as_ref(), ReasonKind::WaitPending, "waiting");
            let task_resource = Arc::clone(&resource);
            let handle = tasks.spawn(async move {
                match task_resource.as_waitable() {
                    Some(waiter) => waiter.wait().await,
                    None => Ok(()),
                }
            });
            pending.insert(handle.id(), resource);
        }

        // Tasks only report outcomes; all bucket writes happen here.
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => (e.id(), Err(anyhow::anyhow!("wait task aborted: {e}"))),
            };

            let Some(resource) = pending.remove(&id) else {
                tracing::error!("Wait task {} finished for an unknown resource", id);
                continue;
            };

            match outcome {
                Ok(()) => {
                    self.emit(resource.as_ref(), ReasonKind::Success, "removed");
                    self.buckets.finished.push(resource);
                },
                Err(e) => {
                    self.emit(resource.as_ref(), ReasonKind::Error, &format!("{e:#}"));
                    self.buckets.failed.push(resource);
                },
            }
        }
    }

    /// Requeue every failed resource and run remove and wait again.
    /// Filters are not re-applied.
    pub async fn retry(&mut self) {
        self.set_stage(Stage::Retrying);
        self.buckets.queue = std::mem::take(&mut self.buckets.failed);

        self.handle_queue().await;
        self.wait().await;
        self.passes += 1;
    }

    fn emit(&self, resource: &dyn Resource, kind: ReasonKind, message: &str) {
        self.sink.emit(ResourceEvent {
            resource,
            kind,
            message,
        });
    }

    fn set_stage(&mut self, stage: Stage) {
        tracing::debug!("Stage {:?} -> {:?} ({:?})", self.stage, stage, self.buckets);
        self.stage = stage;
    }
}
