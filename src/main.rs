use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use stagehand::config::Config;
use stagehand::deploy::{Deployer, ProcessSupervisor};

/// Deploy a JVM artifact to this host and supervise it.
#[derive(Parser)]
#[command(name = "stagehand", version)]
struct Cli {
    /// SSH URL of the source repository
    repo_url: String,

    /// Directory the repository is staged into
    #[arg(long, default_value = "./app")]
    target_dir: PathBuf,

    /// Port the application binds
    #[arg(long, default_value_t = 9000)]
    port: u16,

    /// Keep running after launch; exit 0 on interrupt
    #[arg(long)]
    daemon: bool,

    /// Build the artifact from source instead of expecting a prebuilt one
    #[arg(long)]
    build: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("STAGEHAND_LOG").unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(cli.repo_url, cli.target_dir, cli.port, cli.daemon, cli.build);

    tracing::info!(
        repo_url = %cfg.repo_url,
        target_dir = %cfg.target_dir.display(),
        port = cfg.port,
        daemon = cfg.daemon,
        build = cfg.build,
        "starting deployment"
    );

    let deployer = Deployer::new(cfg.clone(), ProcessSupervisor::new());

    let pid = match deployer.run().await {
        Ok(pid) => pid,
        Err(e) => {
            tracing::error!(stage = %e.stage(), error = %e, "deployment failed");
            std::process::exit(1);
        }
    };

    if cfg.daemon {
        tracing::info!(pid, "running in daemon mode until interrupted");
        shutdown_signal().await;
        deployer.supervisor().terminate().await;
        tracing::info!("shutdown complete");
    } else {
        // The child keeps running; the handle is simply released.
        tracing::info!(pid, "deployment complete, process running");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
