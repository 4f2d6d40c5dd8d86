//! Cloud storage volumes

pub mod ebs;
