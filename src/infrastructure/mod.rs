//! Infrastructure layer - AWS adapters, services and run plumbing

pub mod aws;
pub mod observability;
pub mod output;
pub mod services;
