//! GCP API interaction module
//!
//! Authentication, HTTP plumbing and the session context shared by every
//! lister and resource of a run.
//!
//! # Module Structure
//!
//! - [`auth`] - Credential sources (profile, service account key, access token)
//! - [`client`] - Session client: credentials, project, region and API URLs
//! - [`http`] - HTTP utilities for REST API calls
//! - [`operation`] - Polling of long-running operations
//! - [`projects`] - Project lookup used to validate the session
//!
//! # Example
//!
//! ```ignore
//! use crate::gcp::auth::{CredentialSource, GcpCredentials};
//! use crate::gcp::client::GcpClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let source = CredentialSource::Profile("default".to_string());
//!     let credentials = GcpCredentials::new(&source).await?;
//!     let client = GcpClient::from_credentials(credentials, "my-project", "us-central1")?;
//!     let disks = client.get(&client.compute_aggregated_url("disks")).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod operation;
pub mod projects;
