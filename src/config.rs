use std::env;
use std::path::PathBuf;

/// Everything one deployment attempt needs. Built once from the CLI
/// arguments plus environment defaults; immutable afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// SSH URL of the source repository.
    pub repo_url: String,
    /// Directory the repository is staged into.
    pub target_dir: PathBuf,
    /// Port the application binds (passed to the child via `PORT`).
    pub port: u16,
    /// Keep running after a successful launch until interrupted.
    pub daemon: bool,
    /// Build the artifact from source instead of expecting a prebuilt one.
    pub build: bool,
    /// Name of the deploy-key secret in the secret store.
    pub secret_name: String,
    /// Secret-store region / namespace.
    pub region: String,
    /// Base URL of the secret store.
    pub secrets_endpoint: String,
    /// Caller credential for the secret store. Absence is a configuration
    /// error surfaced at fetch time, not here.
    pub secrets_token: Option<String>,
    /// Directory the deploy key and ssh config are installed into.
    pub ssh_dir: PathBuf,
    /// Optional JVM home override; skips toolchain discovery when set.
    pub java_home: Option<PathBuf>,
}

impl Config {
    /// Merge CLI values with environment defaults.
    pub fn load(repo_url: String, target_dir: PathBuf, port: u16, daemon: bool, build: bool) -> Self {
        let region = env::var("AWS_REGION").unwrap_or_else(|_| "eu-north-1".into());
        Self {
            repo_url,
            target_dir,
            port,
            daemon,
            build,
            secret_name: env::var("SSH_SECRET_NAME").unwrap_or_else(|_| "java-app-ssh-key".into()),
            secrets_endpoint: env::var("STAGEHAND_SECRETS_ENDPOINT")
                .unwrap_or_else(|_| format!("https://secrets.{region}.amazonaws.com")),
            region,
            secrets_token: env::var("STAGEHAND_SECRETS_TOKEN").ok(),
            ssh_dir: env::var("STAGEHAND_SSH_DIR").map_or_else(|_| default_ssh_dir(), PathBuf::from),
            java_home: env::var("JAVA_HOME").ok().map(PathBuf::from),
        }
    }
}

fn default_ssh_dir() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".ssh")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_secret_name() {
        let cfg = Config::load("git@example.com:a/b.git".into(), "./app".into(), 9000, false, false);
        if env::var("SSH_SECRET_NAME").is_err() {
            assert_eq!(cfg.secret_name, "java-app-ssh-key");
        }
    }

    #[test]
    fn default_region() {
        let cfg = Config::load("git@example.com:a/b.git".into(), "./app".into(), 9000, false, false);
        if env::var("AWS_REGION").is_err() {
            assert_eq!(cfg.region, "eu-north-1");
        }
    }

    #[test]
    fn endpoint_follows_region() {
        let cfg = Config::load("git@example.com:a/b.git".into(), "./app".into(), 9000, false, false);
        if env::var("STAGEHAND_SECRETS_ENDPOINT").is_err() && env::var("AWS_REGION").is_err() {
            assert_eq!(cfg.secrets_endpoint, "https://secrets.eu-north-1.amazonaws.com");
        }
    }

    #[test]
    fn ssh_dir_under_home() {
        let cfg = Config::load("git@example.com:a/b.git".into(), "./app".into(), 9000, false, false);
        if env::var("STAGEHAND_SSH_DIR").is_err() {
            assert!(cfg.ssh_dir.ends_with(".ssh"));
        }
    }
}
