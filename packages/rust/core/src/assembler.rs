//! Snapshot assembler.
//!
//! Turns a [`RunOutput`] into the persisted [`Snapshot`] and writes it as
//! pretty-printed JSON. Only called after a successful run, so a failed run
//! never replaces the previous snapshot.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use nodecatalog_shared::{CatalogError, Result, Snapshot};

use crate::pipeline::RunOutput;

/// Build the snapshot document for `output`, stamped with `generated`.
pub fn build_snapshot(output: &RunOutput, generated: DateTime<Utc>) -> Snapshot {
    let catalogue = &output.catalogue;
    Snapshot {
        generated,
        core_count: catalogue.core_count,
        community_count: catalogue.community.len(),
        total: catalogue.nodes.len(),
        nodes: catalogue.nodes.clone(),
        node_types: output.node_types.clone(),
        package_versions: output.package_versions.clone(),
        meta: Some(output.meta.clone()),
    }
}

/// Write `snapshot` to `path`, creating parent directories as needed.
#[instrument(skip(snapshot), fields(path = %path.display(), total = snapshot.total))]
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
    }

    write_json(path, snapshot)?;
    info!(path = %path.display(), total = snapshot.total, "snapshot written");
    Ok(())
}

/// Serialize `data` as pretty JSON and write it to `path`.
fn write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(data)
        .map_err(|e| CatalogError::validation(format!("JSON serialization failed: {e}")))?;
    json.push('\n');
    std::fs::write(path, json).map_err(|e| CatalogError::io(path, e))?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}
