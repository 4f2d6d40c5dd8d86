//! Polaris connection layer

pub mod auth;
pub mod client;
pub mod http;
pub mod service_account;

pub use auth::{BaseUrl, PolarisCredentials};
pub use client::{PolarisClient, QueryRequest};
pub use http::{format_polaris_error, PolarisHttpClient};
pub use service_account::{ApplianceToken, ServiceAccount};
