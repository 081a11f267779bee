//! `shellpilot-worker`: serves the execution engine over stdin/stdout.
//!
//! Reads one JSON request per line from stdin and writes one JSON response
//! per line to stdout. Logs go to stderr.
//!
//! # Environment variables
//!
//! Engine settings are documented on `EngineConfig::from_env`. The worker
//! itself reads:
//!
//! | Variable                 | Required | Default | Description                     |
//! |--------------------------|----------|---------|---------------------------------|
//! | `WORKER_MAX_CONCURRENCY` | no       | `8`     | Requests executed concurrently  |
//! | `LOG_FORMAT`             | no       | `text`  | `text` or `json` log lines      |
//! | `RUST_LOG`               | no       | `shellpilot_worker=info,shellpilot_core=info` | Log filter |

use std::sync::Arc;

use shellpilot_core::{Engine, EngineConfig};
use shellpilot_worker::config::{LogFormat, WorkerConfig};
use shellpilot_worker::server;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let worker_config = WorkerConfig::from_env();
    init_tracing(
        worker_config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or_default(),
    );

    let worker_config = worker_config.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid worker configuration");
        std::process::exit(1);
    });

    let engine_config = EngineConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid engine configuration");
        std::process::exit(1);
    });

    tracing::info!(
        shell = %engine_config.shell,
        command_timeout_secs = engine_config.command_timeout.as_secs(),
        script_timeout_secs = engine_config.script_timeout.as_secs(),
        install_timeout_secs = engine_config.install_timeout.as_secs(),
        allow_remediation = engine_config.allow_remediation,
        auto_sudo = engine_config.auto_sudo,
        package_manager = %engine_config.package_manager,
        "Starting shellpilot-worker",
    );

    let engine = Engine::new(engine_config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build execution engine");
        std::process::exit(1);
    });

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let result = server::serve(
        Arc::new(engine),
        tokio::io::BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        cancel,
        worker_config.max_concurrency,
    )
    .await;

    let code = match result {
        Ok(_) => {
            tracing::info!("Worker stopped");
            0
        }
        Err(e) => {
            tracing::error!(error = %e, "Worker stopped with an I/O error");
            1
        }
    };

    // A blocked stdin read would otherwise keep the runtime from shutting down.
    std::process::exit(code);
}

/// Install the stderr subscriber in the requested format.
fn init_tracing(format: LogFormat) {
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shellpilot_worker=info,shellpilot_core=info".into()),
        )
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), stopping intake");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping intake");
        }
    }
}
