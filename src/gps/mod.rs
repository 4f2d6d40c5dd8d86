//! Global protection: clusters, SLA domains, files and vSphere VMs

pub mod cluster;
pub mod files;
pub mod sla;
pub mod vm;
