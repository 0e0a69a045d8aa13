//! PMP KB Provisioner
//!
//! Provisions the vector-backed knowledge base of a managed conversational
//! agent: vector storage with a fallback backend, the knowledge base and its
//! document data source, an ingestion run and the agent association.

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
