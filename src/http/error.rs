//! Request rejection errors.

use http::StatusCode;
use thiserror::Error;

use crate::security::RejectionReason;

/// Every way a request can be refused before it reaches the handler.
///
/// Each variant ends the connection after a bodyless error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error(transparent)]
    Limit(#[from] RejectionReason),

    #[error("malformed request line")]
    MalformedRequestLine,

    #[error("malformed header field")]
    MalformedHeader,

    #[error("request line exceeds the configured maximum")]
    RequestLineTooLong,

    #[error("unsupported HTTP version")]
    UnsupportedVersion,

    #[error("timed out reading request headers")]
    HeadersTimeout,
}

impl RequestError {
    /// Status sent back to the client.
    pub fn http_status(&self) -> StatusCode {
        match self {
            RequestError::Limit(_) => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            RequestError::MalformedRequestLine | RequestError::MalformedHeader => {
                StatusCode::BAD_REQUEST
            }
            RequestError::RequestLineTooLong => StatusCode::URI_TOO_LONG,
            RequestError::UnsupportedVersion => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            RequestError::HeadersTimeout => StatusCode::REQUEST_TIMEOUT,
        }
    }

    /// Stable label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestError::Limit(reason) => reason.as_str(),
            RequestError::MalformedRequestLine => "malformed_request_line",
            RequestError::MalformedHeader => "malformed_header",
            RequestError::RequestLineTooLong => "request_line_too_long",
            RequestError::UnsupportedVersion => "unsupported_version",
            RequestError::HeadersTimeout => "headers_timeout",
        }
    }
}
