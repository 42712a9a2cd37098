//! Nuke engine
//!
//! Drives discovered resources to deletion:
//! Scan → Filter → Remove → Wait → Retry.
//!
//! # Module Structure
//!
//! - [`resource`] - Resource handle capabilities and the lister contract
//! - [`event`] - Transition events and the console sink
//! - [`engine`] - The orchestrator and its buckets
//!
//! # Example
//!
//! ```ignore
//! use crate::nuke::{ConsoleSink, Nuke, NukeParameters};
//!
//! async fn example(session: Arc<GcpClient>, listers: Vec<Box<dyn Lister>>) -> anyhow::Result<()> {
//!     let mut nuke = Nuke::new(NukeParameters::default(), session, listers, Arc::new(ConsoleSink::stdout()));
//!     let summary = nuke.run().await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod event;
pub mod resource;

pub use engine::{Buckets, Nuke, NukeParameters, Stage, Summary};
pub use event::{ConsoleSink, EventSink, ReasonKind, ResourceEvent};
pub use resource::{Filterable, Lister, Resource, ResourceHandle, Waitable};
