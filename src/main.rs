use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tickmon::{
    collector::Collector,
    config::Config,
    http::{self, AppState},
    query::MetricService,
    registry::{MethodRegistry, MetricRegistry},
    repo::Repository,
    sqlite::SqliteRepository,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Lightweight single-node metrics collector.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// The address to listen on.
    #[arg(long = "address", env = "TICKMON_ADDR", default_value = "0.0.0.0:6012")]
    addr: String,

    /// Config file path.
    #[arg(long, env = "TICKMON_CONF", default_value = "/etc/tickmon/config.yaml")]
    config: PathBuf,

    /// Enables debug logging. `RUST_LOG` takes precedence.
    #[arg(long)]
    debug: bool,
}

fn setup_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!("tickmon - lightweight monitoring utility");
    debug!("debug mode on");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(args.debug);

    let cfg = Config::load(&args.config)
        .with_context(|| format!("failed to read config {}", args.config.display()))?;
    let repo: Arc<dyn Repository> = Arc::new(
        SqliteRepository::open(&cfg.db.path)
            .await
            .context("database connection failed")?,
    );
    let methods = MethodRegistry::with_builtin();
    let registry =
        MetricRegistry::from_config(&cfg.metrics, &methods).context("failed to create service")?;

    let shutdown = CancellationToken::new();
    let collector = Collector::new(registry, repo.clone(), cfg.tick);
    let mut monitor = tokio::spawn(collector.run(shutdown.clone()));

    let state = AppState {
        service: MetricService::new(repo),
        dashboard: Arc::new(cfg.dashboard),
    };
    let mut server = tokio::spawn({
        let shutdown = shutdown.clone();
        let addr = args.addr.clone();
        async move { http::serve(&addr, state, shutdown).await }
    });

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("shutting down");
            Ok(())
        }
        res = &mut server => {
            let err = match res {
                Ok(Ok(())) => anyhow::anyhow!("HTTP server exited"),
                Ok(Err(e)) => anyhow::Error::new(e).context("HTTP server failed"),
                Err(e) => anyhow::Error::new(e).context("HTTP server panicked"),
            };
            error!(error = %err, "application shutdown unexpectedly");
            Err(err)
        }
        res = &mut monitor => {
            error!("collector exited unexpectedly");
            res.context("collector panicked")?;
            Err(anyhow::anyhow!("collector exited"))
        }
    };

    shutdown.cancel();
    // Handles completed inside the select must not be polled again.
    if !monitor.is_finished() {
        if let Err(e) = monitor.await {
            error!(error = %e, "collector task failed during shutdown");
        }
    }
    if !server.is_finished() {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "HTTP server failed during shutdown"),
            Err(e) => error!(error = %e, "HTTP server task failed during shutdown"),
        }
    }
    result
}
