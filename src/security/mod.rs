//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request bytes:
//!     → http::parser (per header line)
//!     → limits.rs (check header count, header bytes)
//!     → accepted into the header set, or rejected with 431
//! ```
//!
//! # Design Decisions
//! - Fail closed: a broken limit ends the request and the connection
//! - No trust in client input

pub mod limits;

pub use limits::{HeaderLimitGuard, HeaderLimits, RejectionReason};
