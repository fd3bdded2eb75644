//! Render phase: read back what the build phase staged for a revision.

use crate::error::StagingError;
use crate::staging::StagingStore;
use helmsubst_core::RevisionKey;
use std::path::PathBuf;

/// One staged manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedManifest {
    pub path: PathBuf,
    pub content: String,
}

/// Read every staged manifest of `key`.
///
/// # Errors
///
/// [`StagingError::RevisionMissing`] when the build phase has not run for `key`.
pub fn collect_manifests(
    store: &StagingStore,
    key: &RevisionKey,
) -> Result<Vec<StagedManifest>, StagingError> {
    let paths = store.list_artifacts(key)?;
    tracing::debug!(revision = %key, count = paths.len(), "collecting staged manifests");

    paths
        .into_iter()
        .map(|path| {
            let content = std::fs::read_to_string(&path).map_err(|e| StagingError::Read {
                path: path.clone(),
                source: e,
            })?;
            Ok(StagedManifest { path, content })
        })
        .collect()
}
