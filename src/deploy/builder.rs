use std::path::{Path, PathBuf};

use tokio::process::Command;

use super::error::BuildError;

/// Well-known JVM install locations, probed in order. Host images differ in
/// where the runtime lands, so the first match wins.
pub const JAVA_PROBE_PATHS: &[&str] = &[
    "/usr/lib/jvm/java-17-amazon-corretto",
    "/usr/lib/jvm/java-17-amazon-corretto.x86_64",
    "/usr/lib/jvm/java-17-openjdk",
    "/usr/lib/jvm/java-17",
    "/usr/java/amazon-corretto-17",
    "/opt/java/openjdk",
];

const INSTALL_PACKAGE: &str = "java-17-amazon-corretto-headless";
const PROVISIONING_LOG: &str = "/var/log/user-data.log";

/// The build tool chosen for the staged repository.
#[derive(Debug, PartialEq, Eq)]
pub enum BuildTool {
    /// Wrapper script bundled in the repository. Preferred.
    Wrapper(PathBuf),
    /// System-installed gradle on PATH.
    System,
}

// ---------------------------------------------------------------------------
// Toolchain discovery
// ---------------------------------------------------------------------------

/// Locate a usable JVM home. Ordered chain of fallible strategies:
/// well-known paths, then PATH resolution, then (after dumping host
/// diagnostics) an on-the-fly install and re-probe.
#[tracing::instrument(err)]
pub async fn find_java_home() -> Result<PathBuf, BuildError> {
    let candidates: Vec<PathBuf> = JAVA_PROBE_PATHS.iter().map(PathBuf::from).collect();

    if let Some(home) = probe_known_paths(&candidates) {
        tracing::info!(java_home = %home.display(), "java found at well-known path");
        return Ok(home);
    }

    if let Some(home) = resolve_from_path().await {
        tracing::info!(java_home = %home.display(), "java resolved from PATH");
        return Ok(home);
    }

    // Nothing resolved: surface host state for operator triage before the
    // last-resort install.
    dump_host_diagnostics().await;

    tracing::warn!(package = INSTALL_PACKAGE, "attempting java install");
    if install_java().await {
        if let Some(home) = probe_known_paths(&candidates) {
            tracing::info!(java_home = %home.display(), "java found after install");
            return Ok(home);
        }
        if let Some(home) = resolve_from_path().await {
            tracing::info!(java_home = %home.display(), "java on PATH after install");
            return Ok(home);
        }
    }

    Err(BuildError::JavaNotFound)
}

/// First candidate containing `bin/java` wins. Deterministic precedence.
pub fn probe_known_paths(candidates: &[PathBuf]) -> Option<PathBuf> {
    for path in candidates {
        let java_bin = path.join("bin/java");
        tracing::debug!(candidate = %java_bin.display(), "probing for java");
        if java_bin.exists() {
            return Some(path.clone());
        }
    }
    None
}

/// Resolve `java` from the executable search path and derive its home from
/// the `<home>/bin/java` layout.
async fn resolve_from_path() -> Option<PathBuf> {
    let output = Command::new("which").arg("java").output().await.ok()?;
    if !output.status.success() {
        return None;
    }

    let binary = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    tracing::debug!(%binary, "java binary on PATH");
    let path = Path::new(&binary);
    let home = path.parent()?.parent()?;
    if path.ends_with("bin/java") {
        Some(home.to_path_buf())
    } else {
        None
    }
}

/// Host-state dump to aid operator debugging when no runtime resolves.
/// Side-effecting logging only; never part of the control-flow result.
async fn dump_host_diagnostics() {
    if let Ok(out) = Command::new("ls").args(["-la", "/usr/lib/jvm/"]).output().await {
        tracing::warn!(
            listing = %String::from_utf8_lossy(&out.stdout),
            error = %String::from_utf8_lossy(&out.stderr),
            "contents of /usr/lib/jvm"
        );
    }

    if let Ok(out) = Command::new("sh")
        .args(["-c", "rpm -qa | grep -i java"])
        .output()
        .await
    {
        tracing::warn!(
            packages = %String::from_utf8_lossy(&out.stdout),
            "installed java packages"
        );
    }

    if let Ok(out) = Command::new("tail")
        .args(["-20", PROVISIONING_LOG])
        .output()
        .await
        && out.status.success()
    {
        tracing::warn!(
            tail = %String::from_utf8_lossy(&out.stdout),
            "provisioning log tail"
        );
    }
}

/// Last resort: install the runtime via the host package manager.
async fn install_java() -> bool {
    let result = Command::new("sudo")
        .args(["yum", "install", "-y", INSTALL_PACKAGE])
        .output()
        .await;

    match result {
        Ok(out) => {
            tracing::info!(
                code = out.status.code(),
                stdout = %tail(&String::from_utf8_lossy(&out.stdout), 500),
                stderr = %tail(&String::from_utf8_lossy(&out.stderr), 500),
                "java install finished"
            );
            out.status.success()
        }
        Err(e) => {
            tracing::error!(error = %e, "java install could not be started");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Toolchain verification + build
// ---------------------------------------------------------------------------

/// Run `java -version` against the discovered home. Non-zero exit means the
/// runtime is unusable and the build must not proceed.
#[tracing::instrument(fields(java_home = %java_home.display()), err)]
pub async fn verify_java(java_home: &Path) -> Result<(), BuildError> {
    let output = Command::new(java_home.join("bin/java"))
        .arg("-version")
        .envs(java_env(java_home))
        .output()
        .await?;

    // java prints its version banner on stderr
    tracing::debug!(
        code = output.status.code(),
        banner = %tail(&String::from_utf8_lossy(&output.stderr), 200),
        "java version check"
    );

    if output.status.success() {
        Ok(())
    } else {
        Err(BuildError::JavaUnusable(output.status.code().unwrap_or(-1)))
    }
}

/// Prefer the repository's gradle wrapper (made executable if needed) over a
/// system-installed gradle.
#[tracing::instrument(fields(staged_dir = %staged_dir.display()), err)]
pub async fn select_build_tool(staged_dir: &Path) -> Result<BuildTool, BuildError> {
    let gradlew = staged_dir.join("gradlew");
    if gradlew.exists() {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&gradlew, std::fs::Permissions::from_mode(0o755)).await?;
        // Absolute path: the wrapper is exec'd with cwd already inside the
        // staged directory.
        let gradlew = tokio::fs::canonicalize(&gradlew).await?;
        tracing::info!(path = %gradlew.display(), "using bundled gradle wrapper");
        return Ok(BuildTool::Wrapper(gradlew));
    }

    let which = Command::new("which").arg("gradle").output().await?;
    if which.status.success() {
        tracing::info!("gradlew not found, using system gradle");
        return Ok(BuildTool::System);
    }

    Err(BuildError::NoBuildTool)
}

/// Build the staged repository with the discovered runtime injected into the
/// child environment.
#[tracing::instrument(skip(java_home), fields(staged_dir = %staged_dir.display()), err)]
pub async fn build(staged_dir: &Path, java_home: &Path) -> Result<(), BuildError> {
    verify_java(java_home).await?;

    let tool = select_build_tool(staged_dir).await?;
    let mut command = match &tool {
        BuildTool::Wrapper(path) => Command::new(path),
        BuildTool::System => Command::new("gradle"),
    };

    let output = command
        .arg("build")
        .current_dir(staged_dir)
        .envs(java_env(java_home))
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(BuildError::BuildFailed {
            code: output.status.code().unwrap_or(-1),
            stdout: tail(&stdout, 500).to_owned(),
            stderr: tail(&stderr, 500).to_owned(),
        });
    }

    tracing::info!(output_tail = %tail(&stdout, 500), "build completed");
    Ok(())
}

/// `JAVA_HOME` plus a PATH with `<home>/bin` prepended, for child processes
/// only. The supervisor uses the same environment for launch.
pub fn java_env(java_home: &Path) -> Vec<(String, String)> {
    let bin = java_home.join("bin");
    let path = std::env::var("PATH").unwrap_or_default();
    vec![
        ("JAVA_HOME".into(), java_home.display().to_string()),
        ("PATH".into(), format!("{}:{path}", bin.display())),
    ]
}

/// Last `n` characters of captured output, on a char boundary.
pub fn tail(s: &str, n: usize) -> &str {
    if s.len() <= n {
        return s;
    }
    let mut start = s.len() - n;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
