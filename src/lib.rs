//! gnuke - remove every resource from a Google Cloud project
//!
//! Resources are listed, filtered, deleted one at a time, waited on
//! concurrently and retried until nothing is left to fail.

pub mod config;
pub mod gcp;
pub mod nuke;
pub mod resource;

/// Version injected at compile time via GNUKE_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("GNUKE_VERSION") {
    Some(v) => v,
    None => "dev",
};
