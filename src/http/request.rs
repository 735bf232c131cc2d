//! Parsed request head handed to the application.
//!
//! # Responsibilities
//! - Hold the request line fields (method, target, version)
//! - Hold header fields in arrival order, duplicates included
//! - Case-insensitive header lookup
//! - Derive connection reuse from `Connection`, `Content-Length`, `Transfer-Encoding`

use bytes::Bytes;
use http::{Method, Version};

/// The first line of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub target: String,
    pub version: Version,
}

/// One accepted header field. Name and value are views into the line buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    name: Bytes,
    value: Bytes,
}

impl HeaderField {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn name_eq(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.as_bytes())
    }
}

/// Ordered header fields of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    fields: Vec<HeaderField>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: HeaderField) {
        self.fields.push(field);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderField> {
        self.fields.iter()
    }

    /// First value for `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|f| f.name_eq(name))
            .map(HeaderField::value)
    }

    /// Every value for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.name_eq(name))
            .map(HeaderField::value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name_eq(name))
    }
}

impl<'a> IntoIterator for &'a HeaderSet {
    type Item = &'a HeaderField;
    type IntoIter = std::slice::Iter<'a, HeaderField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Request line plus headers of a fully received request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub headers: HeaderSet,
}

impl RequestHead {
    pub fn new(line: RequestLine, headers: HeaderSet) -> Self {
        Self {
            method: line.method,
            target: line.target,
            version: line.version,
            headers,
        }
    }

    /// Path part of the target (query string removed).
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or(&self.target)
    }

    /// Parsed `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|v| std::str::from_utf8(v).ok())
            .and_then(|v| v.trim().parse().ok())
    }

    /// Whether a request body follows the head.
    ///
    /// An unparsable `Content-Length` counts as a body: the framing of the
    /// rest of the stream is unknown.
    pub fn has_body(&self) -> bool {
        if self.headers.contains("transfer-encoding") {
            return true;
        }
        match self.headers.get("content-length") {
            Some(_) => self.content_length() != Some(0),
            None => false,
        }
    }

    /// Whether the client allows the connection to be reused.
    pub fn wants_keep_alive(&self) -> bool {
        let mut close = false;
        let mut keep_alive = false;
        for value in self.headers.get_all("connection") {
            for token in value.split(|&b| b == b',') {
                let token = trim_ows(token);
                if token.eq_ignore_ascii_case(b"close") {
                    close = true;
                } else if token.eq_ignore_ascii_case(b"keep-alive") {
                    keep_alive = true;
                }
            }
        }
        if close {
            return false;
        }
        match self.version {
            Version::HTTP_10 => keep_alive,
            _ => true,
        }
    }
}

/// Strip optional whitespace (SP / HTAB) from both ends.
pub(crate) fn trim_ows(mut bytes: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = bytes {
        bytes = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = bytes {
        bytes = rest;
    }
    bytes
}
