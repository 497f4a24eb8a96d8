use std::path::Path;

use super::error::StageError;

/// Materialize the repository into `target_dir`.
///
/// Any pre-existing directory is removed first; a successful stage leaves
/// exactly the fresh checkout. The clone authenticates with the previously
/// installed deploy key via `GIT_SSH_COMMAND`, with host-key checking
/// disabled to match the installed ssh config.
#[tracing::instrument(skip(key_path), fields(%repo_url, target_dir = %target_dir.display()), err)]
pub async fn stage(repo_url: &str, target_dir: &Path, key_path: &Path) -> Result<(), StageError> {
    if target_dir.exists() {
        tracing::info!("removing existing target directory");
        tokio::fs::remove_dir_all(target_dir)
            .await
            .map_err(StageError::Cleanup)?;
    }

    let ssh_command = format!(
        "ssh -i {} -o StrictHostKeyChecking=no",
        key_path.display()
    );

    let output = tokio::process::Command::new("git")
        .arg("clone")
        .arg(repo_url)
        .arg(target_dir)
        .env("GIT_SSH_COMMAND", ssh_command)
        .output()
        .await
        .map_err(StageError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(StageError::CloneFailed {
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    tracing::info!(
        output_length = output.stdout.len(),
        "repository cloned"
    );
    log_staged_contents(target_dir).await;
    Ok(())
}

/// Post-clone diagnostics: top-level entries and whether the gradle wrapper
/// is present. Logging only; never affects control flow.
async fn log_staged_contents(target_dir: &Path) {
    let mut entries = Vec::new();
    if let Ok(mut dir) = tokio::fs::read_dir(target_dir).await {
        while let Ok(Some(entry)) = dir.next_entry().await {
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    entries.sort();

    let gradlew = target_dir.join("gradlew").exists();
    tracing::debug!(?entries, gradlew_present = gradlew, "staged repository contents");
}
