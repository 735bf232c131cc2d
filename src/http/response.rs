//! Response serialization.
//!
//! # Responsibilities
//! - Serialize handler responses with `Date` and `Content-Length`
//! - Emit the fixed bodyless error response for rejected requests
//! - Close the write half once an error response is flushed
//!
//! # Design Decisions
//! - Error responses carry no body and always `Connection: close`
//! - Both header limit reasons produce byte-identical responses

use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::error::RequestError;

/// Response produced by the application handler.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// `200 OK` with a plain text body.
    pub fn text(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .body(body)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize into `out`.
    ///
    /// `close` adds `Connection: close`; `include_body` is false for `HEAD`.
    pub fn encode(&self, out: &mut BytesMut, date: &str, close: bool, include_body: bool) {
        write_status_line(out, self.status);
        if close {
            out.put_slice(b"Connection: close\r\n");
        }
        write_header(out, "Date", date);
        write_header(out, "Content-Length", &self.body.len().to_string());
        for (name, value) in &self.headers {
            write_header(out, name, value);
        }
        out.put_slice(b"\r\n");
        if include_body {
            out.put_slice(&self.body);
        }
    }
}

/// Writes the terminal response for a refused request.
pub struct RejectionResponder;

impl RejectionResponder {
    /// Exact bytes sent for `error`.
    pub fn render(error: &RequestError, date: &str) -> Bytes {
        let mut out = BytesMut::with_capacity(128);
        write_status_line(&mut out, error.http_status());
        out.put_slice(b"Connection: close\r\n");
        write_header(&mut out, "Date", date);
        out.put_slice(b"Content-Length: 0\r\n\r\n");
        out.freeze()
    }

    /// Send the response, flush it and shut down the write half.
    ///
    /// Does not wait for the client to finish sending.
    pub async fn respond<W>(writer: &mut W, error: &RequestError, date: &str) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&Self::render(error, date)).await?;
        writer.flush().await?;
        writer.shutdown().await
    }
}

fn write_status_line(out: &mut BytesMut, status: StatusCode) {
    out.put_slice(b"HTTP/1.1 ");
    out.put_slice(status.as_str().as_bytes());
    out.put_u8(b' ');
    out.put_slice(status.canonical_reason().unwrap_or("Unknown").as_bytes());
    out.put_slice(b"\r\n");
}

fn write_header(out: &mut BytesMut, name: &str, value: &str) {
    out.put_slice(name.as_bytes());
    out.put_slice(b": ");
    out.put_slice(value.as_bytes());
    out.put_slice(b"\r\n");
}
