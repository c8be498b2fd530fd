use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::report::Artifact;

/// Write artifacts into `dir`, creating it if needed. Existing files are replaced.
pub fn write_artifacts(dir: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = dir.join(&artifact.file_name);
        std::fs::write(&path, &artifact.bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(bytes = artifact.bytes.len(), "Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}
