//! Request header limits.
//!
//! # Responsibilities
//! - Hold the configured header count / total size / request line ceilings
//! - Track headers-seen and bytes-seen for the request being parsed
//! - Decide whether the next header line may be accepted
//!
//! # Design Decisions
//! - Limits checked per line, before the line joins the header set
//! - A rejected line is never counted
//! - Boundary is inclusive: a block of exactly the limit is accepted

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default ceiling for the request line, CRLF included.
pub const DEFAULT_MAX_REQUEST_LINE_SIZE: usize = 8 * 1024;

/// Immutable limits applied to every request on a listener.
///
/// `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderLimits {
    /// Maximum number of header fields per request.
    pub max_request_header_count: Option<usize>,

    /// Maximum sum of raw header line lengths (terminators included,
    /// request line and the final empty line excluded).
    pub max_request_headers_total_size: Option<usize>,

    /// Maximum request line length, CRLF included.
    pub max_request_line_size: Option<usize>,
}

impl HeaderLimits {
    /// Limits with no ceiling at all.
    pub fn unbounded() -> Self {
        Self {
            max_request_header_count: None,
            max_request_headers_total_size: None,
            max_request_line_size: None,
        }
    }

    pub fn with_max_header_count(mut self, count: usize) -> Self {
        self.max_request_header_count = Some(count);
        self
    }

    pub fn with_max_headers_total_size(mut self, size: usize) -> Self {
        self.max_request_headers_total_size = Some(size);
        self
    }

    pub fn with_max_request_line_size(mut self, size: usize) -> Self {
        self.max_request_line_size = Some(size);
        self
    }
}

impl Default for HeaderLimits {
    fn default() -> Self {
        Self {
            max_request_header_count: None,
            max_request_headers_total_size: None,
            max_request_line_size: Some(DEFAULT_MAX_REQUEST_LINE_SIZE),
        }
    }
}

/// Why a request's headers were refused.
///
/// Both variants produce the same `431` response on the wire; the variant is
/// kept for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RejectionReason {
    #[error("request header count exceeds limit")]
    HeaderCountExceeded,

    #[error("request headers total size exceeds limit")]
    HeaderTotalSizeExceeded,
}

impl RejectionReason {
    /// Stable label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::HeaderCountExceeded => "header_count_exceeded",
            RejectionReason::HeaderTotalSizeExceeded => "header_total_size_exceeded",
        }
    }
}

/// Per-request counters checked against [`HeaderLimits`].
#[derive(Debug, Clone)]
pub struct HeaderLimitGuard {
    limits: HeaderLimits,
    headers_seen: usize,
    bytes_seen: usize,
}

impl HeaderLimitGuard {
    pub fn new(limits: HeaderLimits) -> Self {
        Self {
            limits,
            headers_seen: 0,
            bytes_seen: 0,
        }
    }

    /// Admit one header line of `raw_len` bytes, or refuse it.
    ///
    /// On refusal the counters are left exactly as they were.
    pub fn check_and_record(&mut self, raw_len: usize) -> Result<(), RejectionReason> {
        self.check(raw_len)?;
        self.headers_seen += 1;
        self.bytes_seen += raw_len;
        Ok(())
    }

    /// Same decision as [`check_and_record`](Self::check_and_record) without
    /// recording anything. Count is checked before size.
    pub fn check(&self, raw_len: usize) -> Result<(), RejectionReason> {
        if let Some(max) = self.limits.max_request_header_count {
            if self.headers_seen + 1 > max {
                return Err(RejectionReason::HeaderCountExceeded);
            }
        }
        if !self.fits(raw_len) {
            return Err(RejectionReason::HeaderTotalSizeExceeded);
        }
        Ok(())
    }

    /// Whether a line of `raw_len` bytes still fits in the size budget.
    pub fn fits(&self, raw_len: usize) -> bool {
        match self.limits.max_request_headers_total_size {
            Some(max) => self.bytes_seen.saturating_add(raw_len) <= max,
            None => true,
        }
    }

    pub fn headers_seen(&self) -> usize {
        self.headers_seen
    }

    pub fn bytes_seen(&self) -> usize {
        self.bytes_seen
    }

    pub fn limits(&self) -> &HeaderLimits {
        &self.limits
    }

    /// Zero the counters for the next request on a kept-alive connection.
    pub fn reset(&mut self) {
        self.headers_seen = 0;
        self.bytes_seen = 0;
    }
}
