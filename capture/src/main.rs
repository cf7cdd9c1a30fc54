use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timelapse_capture::{scheduler, sink};
use timelapse_common::config::{Config, OutputTarget};
use timelapse_common::source::{open_source, SourceGuard};
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
        interval_secs = config.capture.interval_secs,
        output = config.capture.output,
        "starting timelapse capture"
    );

    let target = OutputTarget::parse(&config.capture.output);
    let weather = config
        .weather
        .enabled
        .then(|| sink::WeatherClient::new(&config.weather));

    let sink = match sink::build_sink(&target, weather) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to set up output sink");
            std::process::exit(1);
        }
    };

    let source = match open_source(&config.capture.source) {
        Ok(s) => SourceGuard::new(s),
        Err(e) => {
            error!(error = %e, "failed to open frame source");
            std::process::exit(1);
        }
    };

    // Single-writer flag: false at startup, set at most once by the signal
    // handler, observed between scheduler iterations.
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        shutdown_signal().await;
        flag.store(true, Ordering::SeqCst);
    });

    scheduler::run(
        source,
        sink.as_ref(),
        Duration::from_secs(config.capture.interval_secs),
        shutdown,
    )
    .await;

    info!("capture session ended");
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down after current iteration");
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
            info!("received SIGTERM, shutting down after current iteration");
        }
    }
}
