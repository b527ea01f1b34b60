//! Upstream knowledge sources for nodecatalog.
//!
//! This crate provides:
//! - [`transport`] — counted HTTP client with per-destination header policy
//! - [`paginate`] — offset pagination and the 429 retry guard
//! - [`patterns`] — regex extraction over documents and node definitions
//! - [`connectors`] — one connector per upstream source, plus [`ConnectorRegistry`]

pub mod connectors;
pub mod paginate;
pub mod patterns;
pub mod transport;

pub use connectors::{
    Connector, ConnectorRegistry, DirectoryEntry, DocumentScan, NodeTypeExtractor, NpmSearch,
    RegistryListing, TopicSearch, VersionLookup, collect_best_effort,
};
pub use paginate::{paginate, retry_rate_limited};
pub use patterns::{CandidateFilter, NodeDefinition, extract_package_mentions, parse_node_definition};
pub use transport::{Transport, TransportOptions};
