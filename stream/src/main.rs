use std::path::PathBuf;
use std::sync::Arc;
use timelapse_common::config::Config;
use timelapse_common::source::{open_source, SourceGuard};
use timelapse_stream::registry::SharedSourceProducer;
use timelapse_stream::server::StreamServer;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        source = config.capture.source,
        host = config.stream.host,
        port = config.stream.port,
        route = config.stream.route,
        "starting timelapse stream server"
    );

    let source = match open_source(&config.capture.source) {
        Ok(s) => SourceGuard::new(s),
        Err(e) => {
            error!(error = %e, "failed to open frame source");
            std::process::exit(1);
        }
    };
    let producer = Arc::new(SharedSourceProducer::new(source));

    let mut server = StreamServer::new(
        &config.stream.host,
        config.stream.port,
        config.stream.jpeg_quality,
    );
    if let Err(e) = server.register(&config.stream.route, producer) {
        error!(error = %e, "invalid stream route configuration");
        std::process::exit(1);
    }

    let handle = server.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        handle.stop();
    });

    if let Err(e) = server.start().await {
        error!(error = %e, "stream server failed");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, stopping stream server");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("received SIGTERM, stopping stream server");
        }
    }
}
