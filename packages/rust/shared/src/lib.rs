//! Shared types, error model, and configuration for nodecatalog.
//!
//! This crate is the foundation depended on by all other nodecatalog crates.
//! It provides:
//! - [`CatalogError`] — the unified error type
//! - Domain types ([`RunContext`], [`SourceOutcome`], [`Snapshot`])
//! - Configuration ([`AppConfig`], [`EscalationRule`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DOCUMENT_SOURCE, DocumentConfig, EscalationRule, HttpConfig, NPM_SOURCE, NpmConfig,
    OutputConfig, REGISTRY_SOURCE, RegistryConfig, SourceRole, TOPICS_SOURCE, TopicsConfig,
    VersionsConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    read_token,
};
pub use error::{CatalogError, RATE_LIMITED_STATUS, Result};
pub use types::{RunContext, Snapshot, SnapshotMeta, SourceOutcome, SourceResult};
