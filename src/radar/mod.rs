//! Radar: anomaly analysis and indicator of compromise scans

pub mod anomaly;
pub mod csv;
pub mod ioc;
