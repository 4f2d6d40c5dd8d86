//! Kubernetes clusters and namespaces

pub mod cluster;
pub mod namespace;
