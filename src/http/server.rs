//! HTTP server setup and accept loop.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Snapshot the current configuration for each new connection
//! - Swap in reloaded configuration without disturbing open connections
//! - Run one task per connection inside a span carrying its ID
//! - Stop accepting on shutdown and drain open connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};

use super::connection::{Connection, ConnectionEnd, ConnectionSettings};
use super::date::DateCache;
use super::handler::{Handler, HelloWorld};

/// Pause after a failed accept so resource exhaustion does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// HTTP/1.1 server enforcing request header limits.
pub struct HttpServer {
    config: Arc<ArcSwap<ServerConfig>>,
    handler: Arc<dyn Handler>,
    dates: Arc<DateCache>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a server answering accepted requests with `handler`.
    pub fn new(config: ServerConfig, handler: impl Handler) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            handler: Arc::new(handler),
            dates: Arc::new(DateCache::new()),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Create a server with the default `hello, world` handler.
    pub fn with_default_handler(config: ServerConfig) -> Self {
        Self::new(config, HelloWorld)
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns once `shutdown` fires and open connections have drained or
    /// the grace period has passed.
    pub async fn run(
        self,
        listener: Listener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(self.dates.clone().run(shutdown.resubscribe()));

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit),
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(new_config) = config_updates.recv() => {
                    tracing::info!(
                        max_header_count = ?new_config.limits.max_request_header_count,
                        max_headers_total_size = ?new_config.limits.max_request_headers_total_size,
                        "Configuration reloaded"
                    );
                    self.config.store(Arc::new(new_config));
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        self.drain().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let settings = ConnectionSettings::from(self.config.load().as_ref());
        let guard = self.tracker.track();
        let span = tracing::info_span!("connection", id = %guard.id(), peer = %peer);
        let mut connection = Connection::new(
            stream,
            settings,
            self.handler.clone(),
            self.dates.clone(),
            self.tracker.draining(),
        );

        tokio::spawn(
            async move {
                let _permit = permit;
                let _guard = guard;
                match connection.serve().await {
                    Ok(ConnectionEnd::Rejected(error)) => {
                        tracing::debug!(reason = error.as_str(), "Connection closed after refusal");
                    }
                    Ok(end) => {
                        tracing::trace!(
                            end = ?end,
                            requests = connection.requests_served(),
                            "Connection finished"
                        );
                    }
                    Err(e) => tracing::debug!(error = %e, "Connection I/O error"),
                }
            }
            .instrument(span),
        );
    }

    async fn drain(&self) {
        self.tracker.start_draining();
        let grace = self.config.load().timeouts.shutdown();
        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active, grace_secs = grace.as_secs(), "Draining connections");
        }
        if tokio::time::timeout(grace, self.tracker.wait_for_idle())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Shutdown grace period elapsed with connections still open"
            );
        }
    }
}
