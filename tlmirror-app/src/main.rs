use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tlmirror_common::observability::{LogConfig, init_logging};
use tlmirror_config::{TlMirrorConfig, TlMirrorConfigLoader};
use tlmirror_web::{AppState, router};

#[derive(Parser, Debug)]
#[command(name = "tlmirror", version, about = "Recreate someone's home timeline as a Twitter list")]
struct Args {
    /// YAML config file; skipped when it does not exist.
    #[arg(long, env = "TLMIRROR_CONFIG", default_value = "tlmirror.yaml")]
    config: PathBuf,
    /// Listen address, overrides `server.bind`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1) Load config (env wins over the file)
    let cfg: TlMirrorConfig = TlMirrorConfigLoader::new()
        .with_optional_file(&args.config)
        .load()?;

    // 2) Logging
    let log_path = init_logging(LogConfig {
        app_name: "tlmirror",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
    })?;

    // 3) Serve
    let state = AppState::from_config(&cfg)?;
    let bind = args.bind.unwrap_or_else(|| cfg.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        environment = ?cfg.server.environment,
        log = %log_path.display(),
        "tlmirror.listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    tracing::info!("tlmirror.stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
