use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use super::error::CredentialError;

/// Install the deploy key, plus an ssh config entry for the repository host
/// when one is known. Returns the path to the installed key file.
///
/// The key file is owner-only (0600) inside an owner-only directory (0700);
/// permissions are verified after the chmod. Host-key checking is disabled
/// for the mapped host: the target host is short-lived and the clone runs
/// over an operator-controlled network. Known transport-auth weakening.
#[tracing::instrument(skip(key_material), fields(ssh_dir = %ssh_dir.display(), ?host), err)]
pub async fn install_deploy_key(
    ssh_dir: &Path,
    host: Option<&str>,
    key_material: &str,
) -> Result<PathBuf, CredentialError> {
    tokio::fs::create_dir_all(ssh_dir).await?;
    tokio::fs::set_permissions(ssh_dir, std::fs::Permissions::from_mode(0o700)).await?;

    let key_path = ssh_dir.join("deploy_key");
    tracing::debug!(path = %key_path.display(), "writing deploy key");
    tokio::fs::write(&key_path, key_material).await?;
    tokio::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600)).await?;

    let mode = tokio::fs::metadata(&key_path).await?.permissions().mode() & 0o777;
    if mode != 0o600 {
        return Err(CredentialError::BadPermissions {
            path: key_path,
            mode,
        });
    }

    if let Some(host) = host {
        let config = format!(
            "Host {host}\n    HostName {host}\n    User git\n    IdentityFile {}\n    StrictHostKeyChecking no\n",
            key_path.display()
        );
        tokio::fs::write(ssh_dir.join("config"), config).await?;
    }

    tracing::info!("deploy key installed");
    Ok(key_path)
}

/// Derive the ssh host from a repository URL. Handles `ssh://git@host/path`
/// and the scp-like `git@host:path` form; local paths and `file://` URLs
/// have no transport host.
pub fn repo_host(repo_url: &str) -> Option<String> {
    // Scheme-qualified forms. Anything scp-like also parses as a Url (a
    // bare hostname is a legal scheme), so gate on an explicit "://".
    if repo_url.contains("://") {
        let url = url::Url::parse(repo_url).ok()?;
        return if url.scheme() == "ssh" {
            url.host_str().map(ToOwned::to_owned)
        } else {
            None
        };
    }

    // scp-like: [user@]host:path
    if let Some((prefix, path)) = repo_url.split_once(':')
        && !path.is_empty()
        && !prefix.contains('/')
    {
        let host = prefix.rsplit_once('@').map_or(prefix, |(_, h)| h);
        if !host.is_empty() {
            return Some(host.to_owned());
        }
    }

    None
}
