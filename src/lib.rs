//! HTTP/1.1 server that enforces request header limits.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client bytes
//!     ──────────────▶ net::Listener ──▶ http::server ──▶ http::connection
//!                      (permits)        (config snap)        │
//!                                                             ▼
//!                                          cursor ─▶ tokenizer ─▶ parser
//!                                                                  │ ▲
//!                                                                  ▼ │
//!                                                          security::limits
//!                                                                  │
//!                          ┌───────────────────────────────────────┤
//!                          ▼                                       ▼
//!              RejectionResponder (431/400/...)             Handler → Response
//!                    + lingering close                      + keep-alive
//! ```
//!
//! Cross-cutting: `config` (TOML, validation, hot reload), `observability`
//! (tracing, metrics), `lifecycle` (signals, shutdown).

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{HeaderLimitGuard, HeaderLimits, RejectionReason};
