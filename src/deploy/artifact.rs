use std::path::{Path, PathBuf};

use super::error::ArtifactError;

/// Relative path of the build artifact inside the staged repository.
pub const ARTIFACT_RELATIVE_PATH: &str = "build/libs/project.jar";

/// Full artifact path for a staged directory.
pub fn artifact_path(target_dir: &Path) -> PathBuf {
    target_dir.join(ARTIFACT_RELATIVE_PATH)
}

/// Confirm the artifact exists before any launch is attempted.
/// Returns its size for diagnostics; absence is a hard stop.
#[tracing::instrument(fields(target_dir = %target_dir.display()), err)]
pub async fn verify(target_dir: &Path) -> Result<u64, ArtifactError> {
    let path = artifact_path(target_dir);

    match tokio::fs::metadata(&path).await {
        Ok(meta) => {
            tracing::info!(path = %path.display(), size = meta.len(), "artifact found");
            Ok(meta.len())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ArtifactError::Missing(path)),
        Err(e) => Err(ArtifactError::Io(e)),
    }
}
