//! Async SDK for the Rubrik Polaris GraphQL API
//!
//! [`PolarisClient`] authenticates against a Polaris account and runs the
//! GraphQL documents embedded in [`graphql::registry`]. The domain modules
//! wrap those documents with argument validation and result shaping.

pub mod accounts;
pub mod appflows;
pub mod cluster;
pub mod common;
pub mod compute;
pub mod config;
pub mod error;
pub mod gps;
pub mod graphql;
pub mod k8s;
pub mod monitor;
pub mod polaris;
pub mod radar;
pub mod sonar;
pub mod storage;
pub mod validation;

pub use config::{Config, Overrides, Settings};
pub use error::{PolarisError, Result};
pub use polaris::client::{PolarisClient, QueryRequest};

/// Version injected at compile time via POLARIS_VERSION (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("POLARIS_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
