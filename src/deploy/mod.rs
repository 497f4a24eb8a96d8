pub mod artifact;
pub mod builder;
pub mod credentials;
pub mod error;
pub mod stager;
pub mod supervisor;

pub use error::{DeployError, Stage};
pub use supervisor::ProcessSupervisor;

use crate::config::Config;
use crate::secrets::SecretStore;

/// One deployment attempt: a strictly linear pipeline over the configured
/// repository, aborting on the first stage failure.
///
/// `Init → CredentialInstalled → Staged → [Built] → Verified → Launched →
/// Supervising`. No stage is retried; no stage runs past a failure. The
/// build stage is gated by the config flag, replacing the two parallel
/// script variants this tool grew out of. `Supervising` itself is owned by
/// the caller, which holds the supervisor and decides when to terminate.
pub struct Deployer {
    config: Config,
    secrets: SecretStore,
    supervisor: ProcessSupervisor,
}

impl Deployer {
    pub fn new(config: Config, supervisor: ProcessSupervisor) -> Self {
        let secrets = SecretStore::new(&config.secrets_endpoint, config.secrets_token.clone());
        Self {
            config,
            secrets,
            supervisor,
        }
    }

    /// The supervisor holding the launched process handle.
    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// Run the pipeline to the `Supervising` state. Returns the pid of the
    /// launched process.
    #[tracing::instrument(skip(self), fields(repo_url = %self.config.repo_url), err)]
    pub async fn run(&self) -> Result<u32, DeployError> {
        let cfg = &self.config;

        // Credential: fetch the deploy key and install it for the repo host.
        let key = self.secrets.fetch(&cfg.secret_name, &cfg.region).await?;
        let host = credentials::repo_host(&cfg.repo_url);
        let key_path =
            credentials::install_deploy_key(&cfg.ssh_dir, host.as_deref(), &key).await?;

        // Staging: clean checkout, replacing anything already there.
        stager::stage(&cfg.repo_url, &cfg.target_dir, &key_path).await?;

        // Build (optional): discover the toolchain, then build the artifact.
        // An explicit JAVA_HOME override skips discovery; without the build
        // flag the launch falls back to `java` on PATH.
        let mut java_home = cfg.java_home.clone();
        if cfg.build {
            let home = match java_home {
                Some(home) => home,
                None => builder::find_java_home().await.map_err(DeployError::Build)?,
            };
            builder::build(&cfg.target_dir, &home).await?;
            java_home = Some(home);
        }

        // Verify: the artifact must exist before any launch.
        let size = artifact::verify(&cfg.target_dir).await?;
        tracing::info!(artifact_size = size, "artifact verified");

        // Launch: child process with piped output, checked past the grace
        // window. The handle stays in the supervisor for the caller. The jar
        // path is absolutized so the child's working directory cannot skew it.
        let jar = tokio::fs::canonicalize(artifact::artifact_path(&cfg.target_dir))
            .await
            .map_err(|e| DeployError::Verify(error::ArtifactError::Io(e)))?;
        let pid = self
            .supervisor
            .launch(java_home.as_deref(), &jar, &cfg.target_dir, cfg.port)
            .await?;

        tracing::info!(pid, port = cfg.port, "deployment complete, supervising");
        Ok(pid)
    }
}
