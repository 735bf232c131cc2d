//! Per-connection request loop.
//!
//! # Responsibilities
//! - Feed socket bytes to the request head parser as they arrive
//! - Answer refused requests, then close with a lingering drain
//! - Dispatch accepted heads to the handler and honor keep-alive
//! - Enforce the request head timeout and the idle timeout
//!
//! # Design Decisions
//! - Generic over the stream so tests can drive it through in-memory pipes
//! - Request bodies are never read; a request announcing one ends the
//!   connection after its response
//! - Limits are fixed for the connection's lifetime

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use http::Method;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::ServerConfig;
use crate::observability::metrics;
use crate::security::HeaderLimits;

use super::cursor::ByteCursor;
use super::date::DateCache;
use super::error::RequestError;
use super::handler::Handler;
use super::parser::{ParseStatus, RequestHeaderParser};
use super::request::RequestHead;
use super::response::RejectionResponder;

const READ_CHUNK: usize = 4096;

/// Per-connection snapshot of the settings in force when it was accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub limits: HeaderLimits,
    pub request_headers_timeout: Duration,
    pub keep_alive_timeout: Duration,
    pub linger: Duration,
    pub linger_bytes: usize,
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            limits: config.limits,
            request_headers_timeout: config.timeouts.request_headers(),
            keep_alive_timeout: config.timeouts.keep_alive(),
            linger: config.timeouts.linger(),
            linger_bytes: config.timeouts.linger_bytes,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// Why a connection finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// The client closed between requests, or a response ended the connection.
    Closed,
    /// The client closed partway through a request head.
    Aborted,
    /// No new request arrived within the keep-alive timeout.
    IdleTimeout,
    /// The server started shutting down while the connection was idle.
    Draining,
    /// A request was refused with an error response.
    Rejected(RequestError),
}

enum Next {
    Head(RequestHead),
    End(ConnectionEnd),
}

/// One client connection.
pub struct Connection<S> {
    stream: S,
    settings: ConnectionSettings,
    handler: Arc<dyn Handler>,
    dates: Arc<DateCache>,
    draining: watch::Receiver<bool>,
    cursor: ByteCursor,
    parser: RequestHeaderParser,
    requests: u64,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        settings: ConnectionSettings,
        handler: Arc<dyn Handler>,
        dates: Arc<DateCache>,
        draining: watch::Receiver<bool>,
    ) -> Self {
        let parser = RequestHeaderParser::new(settings.limits);
        Self {
            stream,
            settings,
            handler,
            dates,
            draining,
            cursor: ByteCursor::with_capacity(READ_CHUNK),
            parser,
            requests: 0,
        }
    }

    /// Number of requests answered by the handler so far.
    pub fn requests_served(&self) -> u64 {
        self.requests
    }

    /// Serve requests until the connection ends.
    ///
    /// I/O errors (a peer reset, typically) are returned as-is.
    pub async fn serve(&mut self) -> std::io::Result<ConnectionEnd> {
        loop {
            let head = match self.read_head().await? {
                Next::Head(head) => head,
                Next::End(ConnectionEnd::Rejected(error)) => {
                    self.reject(error).await?;
                    return Ok(ConnectionEnd::Rejected(error));
                }
                Next::End(end) => {
                    if end == ConnectionEnd::Aborted {
                        tracing::debug!(
                            buffered = self.cursor.pending(),
                            "Client closed mid-request, discarding partial head"
                        );
                    }
                    return Ok(end);
                }
            };

            self.requests += 1;
            metrics::record_request();

            let keep_alive =
                head.wants_keep_alive() && !head.has_body() && !*self.draining.borrow();
            tracing::debug!(
                method = %head.method,
                target = %head.target,
                headers = head.headers.len(),
                keep_alive,
                "Request received"
            );

            let response = self.handler.call(&head);
            let mut out = BytesMut::with_capacity(256 + response.body.len());
            response.encode(
                &mut out,
                &self.dates.value(),
                !keep_alive,
                head.method != Method::HEAD,
            );
            self.stream.write_all(&out).await?;
            self.stream.flush().await?;

            if !keep_alive {
                self.stream.shutdown().await?;
                return Ok(ConnectionEnd::Closed);
            }
            self.parser.reset();
        }
    }

    async fn read_head(&mut self) -> std::io::Result<Next> {
        // Both deadlines are fixed per request: blank lines before a request
        // line do not refresh them.
        let idle_deadline = Instant::now() + self.settings.keep_alive_timeout;
        let mut started_at: Option<Instant> = None;
        loop {
            match self.parser.parse(&mut self.cursor) {
                Ok(ParseStatus::Complete(head)) => return Ok(Next::Head(head)),
                Ok(ParseStatus::Incomplete) => {}
                Err(error) => return Ok(Next::End(ConnectionEnd::Rejected(error))),
            }

            if started_at.is_none() && (self.parser.in_progress() || !self.cursor.is_empty()) {
                started_at = Some(Instant::now());
            }

            self.cursor.buf_mut().reserve(READ_CHUNK);
            let read = match started_at {
                Some(start) => {
                    let deadline = start + self.settings.request_headers_timeout;
                    let read = self.stream.read_buf(self.cursor.buf_mut());
                    match tokio::time::timeout_at(deadline, read).await {
                        Ok(read) => read?,
                        Err(_) => {
                            return Ok(Next::End(ConnectionEnd::Rejected(
                                RequestError::HeadersTimeout,
                            )))
                        }
                    }
                }
                None => {
                    let idle = tokio::time::sleep_until(idle_deadline);
                    tokio::select! {
                        biased;
                        _ = drained(&mut self.draining) => return Ok(Next::End(ConnectionEnd::Draining)),
                        read = self.stream.read_buf(self.cursor.buf_mut()) => read?,
                        _ = idle => return Ok(Next::End(ConnectionEnd::IdleTimeout)),
                    }
                }
            };

            if read == 0 {
                let end = if self.parser.in_progress() || !self.cursor.is_empty() {
                    ConnectionEnd::Aborted
                } else {
                    ConnectionEnd::Closed
                };
                return Ok(Next::End(end));
            }
            started_at.get_or_insert_with(Instant::now);
        }
    }

    async fn reject(&mut self, error: RequestError) -> std::io::Result<()> {
        let state = self.parser.state();
        match error {
            RequestError::Limit(reason) => {
                let limits = *self.parser.limits();
                tracing::warn!(
                    reason = reason.as_str(),
                    headers_seen = state.headers_seen,
                    bytes_seen = state.bytes_seen,
                    max_header_count = ?limits.max_request_header_count,
                    max_headers_total_size = ?limits.max_request_headers_total_size,
                    "Request headers exceed limit"
                );
            }
            other => {
                tracing::debug!(
                    reason = other.as_str(),
                    status = %other.http_status(),
                    "Request refused"
                );
            }
        }
        metrics::record_rejection(error.as_str());

        RejectionResponder::respond(&mut self.stream, &error, &self.dates.value()).await?;
        self.linger().await;
        Ok(())
    }

    /// Discard what the client is still sending so the response is not lost
    /// to a reset. Bounded in time and bytes.
    async fn linger(&mut self) {
        self.cursor.clear();
        let deadline = Instant::now() + self.settings.linger;
        let mut scratch = [0u8; READ_CHUNK];
        let mut discarded = 0usize;
        while discarded < self.settings.linger_bytes {
            match tokio::time::timeout_at(deadline, self.stream.read(&mut scratch)).await {
                Ok(Ok(n)) if n > 0 => discarded += n,
                _ => break,
            }
        }
        tracing::trace!(discarded, "Lingering close finished");
    }
}

/// Resolve once draining is signalled. Never resolves if the sender is gone.
async fn drained(draining: &mut watch::Receiver<bool>) {
    loop {
        if *draining.borrow_and_update() {
            return;
        }
        if draining.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
