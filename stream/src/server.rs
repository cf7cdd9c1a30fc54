use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::mjpeg;
use crate::registry::{FrameProducer, RegistryError, StreamRegistry};

/// Server lifecycle. Single instance per process in streaming mode; single
/// writer, transitions only in the order
/// Stopped → Starting → Running → Stopping → Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Owns the listener, the route registry, and the stop wait primitive shared
/// by all connections.
pub struct StreamServer {
    host: String,
    port: u16,
    jpeg_quality: u8,
    registry: StreamRegistry,
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<Lifecycle>>,
    addr_tx: Arc<watch::Sender<Option<SocketAddr>>>,
}

/// Cloneable stop control, safe to trigger from a signal handler or another
/// task. `stop` is idempotent: the first call fires the stop sequence and
/// later calls are no-ops.
#[derive(Clone)]
pub struct ShutdownHandle {
    cancel: CancellationToken,
    state_rx: watch::Receiver<Lifecycle>,
}

impl ShutdownHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> Lifecycle {
        *self.state_rx.borrow()
    }
}

impl StreamServer {
    pub fn new(host: &str, port: u16, jpeg_quality: u8) -> Self {
        let (state_tx, _) = watch::channel(Lifecycle::Stopped);
        let (addr_tx, _) = watch::channel(None);
        Self {
            host: host.to_string(),
            port,
            jpeg_quality,
            registry: StreamRegistry::new(),
            cancel: CancellationToken::new(),
            state_tx: Arc::new(state_tx),
            addr_tx: Arc::new(addr_tx),
        }
    }

    /// Add a named stream route. Only possible before `start` consumes the
    /// server, so the registry is read-only at runtime by construction.
    pub fn register(
        &mut self,
        name: &str,
        producer: Arc<dyn FrameProducer>,
    ) -> Result<(), RegistryError> {
        self.registry.register(name, producer)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            cancel: self.cancel.clone(),
            state_rx: self.state_tx.subscribe(),
        }
    }

    /// Publishes the bound address once the listener is up; lets callers on
    /// an ephemeral port find out where the server landed.
    pub fn bound_addr(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.addr_tx.subscribe()
    }

    /// Serve until told to stop.
    ///
    /// Binds the listener, installs the root route and every registered
    /// stream route, then suspends on the stop token. Does not return until
    /// the full stop sequence has completed, so callers can treat this as a
    /// single blocking "serve until told to stop" call. Stopping before or
    /// during startup still lets this return promptly.
    pub async fn start(self) -> Result<(), ServeError> {
        self.state_tx.send_replace(Lifecycle::Starting);

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ServeError::Bind(addr.clone(), e))?;
        let local = listener
            .local_addr()
            .map_err(|e| ServeError::Bind(addr, e))?;
        self.addr_tx.send_replace(Some(local));

        let names: Vec<String> = self.registry.names().map(|n| n.to_string()).collect();
        let index_body = {
            let mut text = String::from("Available streams:\n\n");
            for name in &names {
                text.push_str(&format!("/{name} \n"));
            }
            text
        };

        let mut app = Router::new().route(
            "/",
            get(move || {
                let body = index_body.clone();
                async move { body }
            }),
        );
        for (name, producer) in self.registry.iter() {
            let producer = Arc::clone(producer);
            let cancel = self.cancel.clone();
            let quality = self.jpeg_quality;
            app = app.route(
                &format!("/{name}"),
                get(move || {
                    let producer = Arc::clone(&producer);
                    let cancel = cancel.clone();
                    async move { mjpeg::response(producer, quality, cancel) }
                }),
            );
        }
        let app = app.layer(TraceLayer::new_for_http());

        self.state_tx.send_replace(Lifecycle::Running);
        info!(addr = %local, routes = names.len(), "stream server running");

        let cancel = self.cancel.clone();
        let state_tx = Arc::clone(&self.state_tx);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                state_tx.send_replace(Lifecycle::Stopping);
                info!("stop signal received, draining connections");
                // Give in-flight part writes a moment to flush.
                tokio::time::sleep(Duration::from_millis(100)).await;
            })
            .await
            .map_err(ServeError::Serve)?;

        self.state_tx.send_replace(Lifecycle::Stopped);
        info!("stream server stopped");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Serve(std::io::Error),
}
