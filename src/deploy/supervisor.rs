use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::builder;
use super::error::LaunchError;

/// How long a freshly launched process gets before liveness is checked.
const GRACE_WINDOW: Duration = Duration::from_secs(2);
/// How long a graceful termination may take before the forced kill.
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(10);

/// The running child: pid plus the handle used for liveness and termination.
#[derive(Debug)]
pub struct SupervisedProcess {
    pub pid: u32,
    child: Child,
}

/// Launches the artifact as a child process and owns its termination
/// sequence.
///
/// The handle lives in a single shared cell: one writer (launch), and
/// `terminate` clears it with `Option::take`, so termination is idempotent
/// and a shutdown path firing before any launch is a no-op. At most one
/// supervised process is active at a time.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    handle: Arc<Mutex<Option<SupervisedProcess>>>,
    grace_window: Duration,
    terminate_timeout: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::with_timing(GRACE_WINDOW, TERMINATE_TIMEOUT)
    }

    /// Supervisor with explicit grace window and termination timeout.
    pub fn with_timing(grace_window: Duration, terminate_timeout: Duration) -> Self {
        Self {
            handle: Arc::new(Mutex::new(None)),
            grace_window,
            terminate_timeout,
        }
    }

    /// Launch `java -jar <jar>` and confirm it survives the grace window.
    ///
    /// Output streams are piped for diagnostics; the port is handed to the
    /// child via `PORT` (binding it is the artifact's responsibility). An
    /// exit inside the grace window fails with the captured output. Returns
    /// the pid on success.
    #[tracing::instrument(
        skip(self, java_home),
        fields(jar = %jar.display(), working_dir = %working_dir.display()),
        err
    )]
    pub async fn launch(
        &self,
        java_home: Option<&Path>,
        jar: &Path,
        working_dir: &Path,
        port: u16,
    ) -> Result<u32, LaunchError> {
        let mut guard = self.handle.lock().await;
        if let Some(existing) = guard.as_ref() {
            return Err(LaunchError::AlreadyRunning(existing.pid));
        }

        let java_bin = java_home.map_or_else(|| "java".into(), |home| home.join("bin/java"));

        let mut command = Command::new(&java_bin);
        command
            .arg("-jar")
            .arg(jar)
            .current_dir(working_dir)
            .env("PORT", port.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(home) = java_home {
            command.envs(builder::java_env(home));
        }

        let mut child = command.spawn().map_err(LaunchError::Spawn)?;
        let pid = child.id().unwrap_or_default();
        tracing::info!(pid, "application process started, waiting grace window");

        tokio::time::sleep(self.grace_window).await;

        if let Some(status) = child.try_wait()? {
            // Dead already: collect whatever it printed before failing.
            let output = child.wait_with_output().await?;
            return Err(LaunchError::ExitedEarly {
                code: status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        tracing::info!(pid, port, "application alive past grace window");
        *guard = Some(SupervisedProcess { pid, child });
        Ok(pid)
    }

    /// Current pid, if a process is being supervised.
    pub async fn pid(&self) -> Option<u32> {
        self.handle.lock().await.as_ref().map(|p| p.pid)
    }

    /// Graceful stop: SIGTERM, bounded wait, then SIGKILL and an unbounded
    /// wait. Idempotent; with no launched process this is a no-op. Returns
    /// whether a process was actually stopped.
    #[tracing::instrument(skip(self))]
    pub async fn terminate(&self) -> bool {
        let Some(mut process) = self.handle.lock().await.take() else {
            tracing::debug!("terminate called with no supervised process");
            return false;
        };

        tracing::info!(pid = process.pid, "stopping application process");

        #[allow(clippy::cast_possible_wrap)]
        let pid = Pid::from_raw(process.pid as i32);
        if let Err(e) = kill(pid, Signal::SIGTERM) {
            tracing::warn!(error = %e, "SIGTERM delivery failed");
        }

        match tokio::time::timeout(self.terminate_timeout, process.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(code = status.code(), "application stopped gracefully");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "wait after SIGTERM failed");
            }
            Err(_) => {
                tracing::warn!("graceful stop timed out, forcing kill");
                let _ = process.child.start_kill();
                let _ = process.child.wait().await;
            }
        }

        true
    }
}
