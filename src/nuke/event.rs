//! Resource state transition events

use super::engine::Summary;
use super::resource::Resource;
use std::fmt;
use std::io::Write;
use std::sync::Mutex;

/// Kind of transition a resource went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonKind {
    Skip,
    Success,
    Error,
    RemoveTriggered,
    WaitPending,
}

impl ReasonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Success => "success",
            Self::Error => "error",
            Self::RemoveTriggered => "remove-triggered",
            Self::WaitPending => "waiting",
        }
    }
}

impl fmt::Display for ReasonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transition of one resource
#[derive(Clone, Copy)]
pub struct ResourceEvent<'a> {
    pub resource: &'a dyn Resource,
    pub kind: ReasonKind,
    pub message: &'a str,
}

impl fmt::Debug for ResourceEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceEvent")
            .field("resource_type", &self.resource.resource_type())
            .field("resource", &self.resource.to_string())
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

/// Receives every resource transition emitted by the orchestrator
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ResourceEvent<'_>);

    /// Called before each retry pass with the counts so far
    fn retrying(&self, _summary: &Summary) {}
}

/// Prints one line per transition and mirrors it to the log
pub struct ConsoleSink<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// Render an event as a single console line
pub fn format_event(event: &ResourceEvent<'_>) -> String {
    format!(
        "{} - {} - [{}] {}",
        event.resource.resource_type(),
        event.resource,
        event.kind,
        event.message
    )
}

impl<W: Write + Send> EventSink for ConsoleSink<W> {
    fn emit(&self, event: ResourceEvent<'_>) {
        match event.kind {
            ReasonKind::Error => tracing::warn!(
                resource_type = event.resource.resource_type(),
                resource = %event.resource,
                reason = %event.kind,
                "{}",
                event.message
            ),
            _ => tracing::info!(
                resource_type = event.resource.resource_type(),
                resource = %event.resource,
                reason = %event.kind,
                "{}",
                event.message
            ),
        }

        self.write_line(&format_event(&event));
    }

    fn retrying(&self, summary: &Summary) {
        self.write_line("");
        self.write_line(&format!("Retrying: {summary}."));
        self.write_line("");
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    fn write_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        // A closed stdout must not abort the run
        let _ = writeln!(out, "{line}");
    }
}
