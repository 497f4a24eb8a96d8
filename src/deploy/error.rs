use std::fmt;
use std::path::PathBuf;

use crate::secrets::SecretsError;

/// Pipeline stage names, used to tag the terminal failure diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Credential,
    Staging,
    Build,
    Verify,
    Launch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Credential => "credential",
            Self::Staging => "staging",
            Self::Build => "build",
            Self::Verify => "verify",
            Self::Launch => "launch",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to write deploy key material: {0}")]
    Io(#[from] std::io::Error),

    #[error("deploy key at {path} has mode {mode:o}, expected 0600")]
    BadPermissions { path: PathBuf, mode: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("failed to remove stale target directory: {0}")]
    Cleanup(std::io::Error),

    #[error("failed to run git: {0}")]
    Spawn(std::io::Error),

    #[error("git clone exited with {code}: {stderr}")]
    CloneFailed { code: i32, stderr: String },
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no usable java runtime found after probing, PATH lookup, and install attempt")]
    JavaNotFound,

    #[error("java version check exited with {0}")]
    JavaUnusable(i32),

    #[error("neither gradlew nor system gradle is available")]
    NoBuildTool,

    #[error("build exited with {code}\nstdout: {stdout}\nstderr: {stderr}")]
    BuildFailed {
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("failed to invoke build toolchain: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact not found at {0}")]
    Missing(PathBuf),

    #[error("cannot inspect artifact: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to spawn application process: {0}")]
    Spawn(std::io::Error),

    #[error("process exited during grace window with {code}\nstdout: {stdout}\nstderr: {stderr}")]
    ExitedEarly {
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("a supervised process is already running (pid {0})")]
    AlreadyRunning(u32),

    #[error("liveness check failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A stage failure. Terminal for the deployment attempt; the pipeline never
/// retries a stage or proceeds past a failed one.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("secret retrieval failed: {0}")]
    Secret(#[from] SecretsError),

    #[error("credential install failed: {0}")]
    Credential(#[from] CredentialError),

    #[error("repository staging failed: {0}")]
    Staging(#[from] StageError),

    #[error("artifact build failed: {0}")]
    Build(#[from] BuildError),

    #[error("artifact verification failed: {0}")]
    Verify(#[from] ArtifactError),

    #[error("process launch failed: {0}")]
    Launch(#[from] LaunchError),
}

impl DeployError {
    /// Which pipeline stage produced this failure.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Secret(_) | Self::Credential(_) => Stage::Credential,
            Self::Staging(_) => Stage::Staging,
            Self::Build(_) => Stage::Build,
            Self::Verify(_) => Stage::Verify,
            Self::Launch(_) => Stage::Launch,
        }
    }
}
