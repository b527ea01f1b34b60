//! Catalogue orchestration for nodecatalog.
//!
//! This crate ties the sources together into one run:
//! - [`escalation`] — primary/fallback source gating
//! - [`reconciler`] — cross-source dedup and ordering
//! - [`pipeline`] — the end-to-end `run`
//! - [`assembler`] — snapshot construction and persistence

pub mod assembler;
pub mod escalation;
pub mod pipeline;
pub mod reconciler;

pub use assembler::{build_snapshot, write_snapshot};
pub use escalation::{EscalationPolicy, EscalationReport};
pub use pipeline::{
    NODE_TYPES_STAGE, PACKAGE_VERSIONS_STAGE, PipelineConfig, ProgressReporter, RunOutput,
    SilentProgress, run, run_with_registry,
};
pub use reconciler::{Catalogue, canonicalize, merge, reconcile};
