use std::path::PathBuf;

use arbiter_gateway::Result;
use arbiter_gateway::config::Config;
use arbiter_gateway::dispatch::{DispatchTarget, Dispatcher, run_dispatcher};
use arbiter_gateway::http::{AppState, bind, router, serve};
use arbiter_gateway::sink::channel;
use arbiter_gateway::telemetry::init_tracing;
use tokio::signal;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::cli::Cli;

const DEFAULT_CONFIG: &str = "arbiter-gateway.toml";

pub async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.log_filter.as_deref(), cli.json_logs)?;

    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut config = Config::from_env_and_file(&config_path)?;
    if let Some(listen) = cli.listen {
        config.http.listen = listen;
    }

    if cli.check_config {
        info!(
            path = %config_path.display(),
            listen = %config.http.listen,
            anonymous = config.http.credentials.is_anonymous(),
            "configuration is valid"
        );
        return Ok(());
    }

    let target = dispatch_target(&config, cli.dry_run);
    let (sink, rx) = channel(config.queue.capacity, config.queue.enqueue_timeout);
    let dispatcher = tokio::spawn(run_dispatcher(
        rx,
        Dispatcher::new(target, config.dispatch.retry_window),
    ));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, draining requests");
        signal_token.cancel();
    });

    let listener = bind(config.http.listen).await?;
    let app = router(AppState::new(config.http, sink.clone()));
    let served = serve(listener, app, shutdown).await;

    sink.close();
    match timeout(config.shutdown_grace, dispatcher).await {
        Ok(Ok(stats)) => info!(
            written = stats.written,
            dropped = stats.dropped,
            "dispatcher drained"
        ),
        Ok(Err(err)) => warn!(error = %err, "dispatcher task terminated unexpectedly"),
        Err(_) => warn!(
            pending = sink.len(),
            "shutdown grace period elapsed, abandoning queued commands"
        ),
    }

    served
}

fn dispatch_target(config: &Config, dry_run: bool) -> DispatchTarget {
    match (&config.dispatch.command_file, dry_run) {
        (_, true) => {
            info!("dry-run: commands will be logged, not written");
            DispatchTarget::Log
        }
        (Some(path), false) => {
            info!(path = %path.display(), "writing commands to command file");
            DispatchTarget::File(path.clone())
        }
        (None, false) => {
            warn!("no command file configured, commands will only be logged");
            DispatchTarget::Log
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
