//! Line grammar for the request head.
//!
//! ```text
//! request-line = method SP request-target SP HTTP-version CRLF
//! header-field = field-name ":" OWS field-value OWS CRLF
//! end-of-head  = CRLF
//! ```
//!
//! Lines are pulled from a [`ByteCursor`]; when no full line is buffered the
//! tokenizer says so instead of waiting.

use bytes::Bytes;
use http::{Method, Version};

use super::cursor::ByteCursor;
use super::error::RequestError;
use super::request::{trim_ows, RequestLine};

/// A header field line as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine {
    pub name: Bytes,
    pub value: Bytes,
    /// Length of the whole line, CRLF included.
    pub raw_len: usize,
}

/// Result of asking for the next line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    RequestLine(RequestLine),
    HeaderField(HeaderLine),
    EndOfHeaders,
    /// No line terminator buffered yet; nothing was consumed.
    Incomplete,
    /// The line was consumed but cannot be accepted.
    Malformed(RequestError),
}

/// Splits buffered bytes into request-line and header-field tokens.
#[derive(Debug, Clone, Copy)]
pub struct LineTokenizer {
    max_request_line_size: Option<usize>,
}

impl LineTokenizer {
    pub fn new(max_request_line_size: Option<usize>) -> Self {
        Self {
            max_request_line_size,
        }
    }

    /// Next request line. Empty lines in front of it are skipped.
    pub fn next_request_line(&self, cursor: &mut ByteCursor) -> Token {
        loop {
            let Some(line) = cursor.try_read_line() else {
                // The line still needs at least its line feed.
                return match self.max_request_line_size {
                    Some(max) if cursor.pending() + 1 > max => {
                        Token::Malformed(RequestError::RequestLineTooLong)
                    }
                    _ => Token::Incomplete,
                };
            };
            if &line[..] == b"\r\n" {
                continue;
            }
            if let Some(max) = self.max_request_line_size {
                if line.len() > max {
                    return Token::Malformed(RequestError::RequestLineTooLong);
                }
            }
            return match parse_request_line(&line) {
                Ok(request_line) => Token::RequestLine(request_line),
                Err(e) => Token::Malformed(e),
            };
        }
    }

    /// Next header field, or the end of the head.
    pub fn next_header_line(&self, cursor: &mut ByteCursor) -> Token {
        let Some(line) = cursor.try_read_line() else {
            return Token::Incomplete;
        };
        match parse_header_line(line) {
            Ok(Some(header)) => Token::HeaderField(header),
            Ok(None) => Token::EndOfHeaders,
            Err(e) => Token::Malformed(e),
        }
    }
}

fn strip_crlf(line: &[u8]) -> Option<&[u8]> {
    line.strip_suffix(b"\r\n")
}

/// Parse `METHOD SP TARGET SP VERSION CRLF`.
pub fn parse_request_line(line: &[u8]) -> Result<RequestLine, RequestError> {
    let content = strip_crlf(line).ok_or(RequestError::MalformedRequestLine)?;

    let mut parts = content.split(|&b| b == b' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(RequestError::MalformedRequestLine);
    };

    if method.is_empty() || !method.iter().all(|&b| is_tchar(b)) {
        return Err(RequestError::MalformedRequestLine);
    }
    let method = Method::from_bytes(method).map_err(|_| RequestError::MalformedRequestLine)?;

    if target.is_empty() || !target.iter().all(|&b| b.is_ascii_graphic()) {
        return Err(RequestError::MalformedRequestLine);
    }
    // Visible ASCII is valid UTF-8.
    let target = String::from_utf8_lossy(target).into_owned();

    let version = parse_version(version)?;

    Ok(RequestLine {
        method,
        target,
        version,
    })
}

fn parse_version(version: &[u8]) -> Result<Version, RequestError> {
    match version {
        b"HTTP/1.1" => Ok(Version::HTTP_11),
        b"HTTP/1.0" => Ok(Version::HTTP_10),
        [b'H', b'T', b'T', b'P', b'/', major, b'.', minor]
            if major.is_ascii_digit() && minor.is_ascii_digit() =>
        {
            Err(RequestError::UnsupportedVersion)
        }
        _ => Err(RequestError::MalformedRequestLine),
    }
}

/// Parse one header line. `Ok(None)` is the empty line ending the head.
pub fn parse_header_line(line: Bytes) -> Result<Option<HeaderLine>, RequestError> {
    let raw_len = line.len();
    let content = strip_crlf(&line).ok_or(RequestError::MalformedHeader)?;
    if content.is_empty() {
        return Ok(None);
    }

    let colon = memchr::memchr(b':', content).ok_or(RequestError::MalformedHeader)?;
    let name = &content[..colon];
    // Also rejects obs-fold lines and whitespace before the colon.
    if name.is_empty() || !name.iter().all(|&b| is_tchar(b)) {
        return Err(RequestError::MalformedHeader);
    }

    let value = trim_ows(&content[colon + 1..]);
    if value.iter().any(|&b| b == b'\r' || b == b'\n' || b == 0) {
        return Err(RequestError::MalformedHeader);
    }

    Ok(Some(HeaderLine {
        name: line.slice_ref(name),
        value: line.slice_ref(value),
        raw_len,
    }))
}

/// RFC 7230 `tchar`.
fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(bytes: &[u8]) -> ByteCursor {
        let mut cursor = ByteCursor::new();
        cursor.append(bytes);
        cursor
    }

    #[test]
    fn request_line() {
        let tokenizer = LineTokenizer::new(None);
        let mut c = cursor(b"GET /index.html?x=1 HTTP/1.1\r\n");
        assert_eq!(
            tokenizer.next_request_line(&mut c),
            Token::RequestLine(RequestLine {
                method: Method::GET,
                target: "/index.html?x=1".to_string(),
                version: Version::HTTP_11,
            })
        );
        assert!(c.is_empty());
    }

    #[test]
    fn request_line_incomplete_consumes_nothing() {
        let tokenizer = LineTokenizer::new(None);
        let mut c = cursor(b"GET / HTTP/1.1\r");
        assert_eq!(tokenizer.next_request_line(&mut c), Token::Incomplete);
        assert_eq!(c.pending(), 15);
    }

    #[test]
    fn skips_leading_empty_lines() {
        let tokenizer = LineTokenizer::new(None);
        let mut c = cursor(b"\r\n\r\nPOST /upload HTTP/1.0\r\n");
        match tokenizer.next_request_line(&mut c) {
            Token::RequestLine(line) => {
                assert_eq!(line.method, Method::POST);
                assert_eq!(line.version, Version::HTTP_10);
            }
            other => panic!("unexpected token: {:?}", other),
        }
    }

    #[test]
    fn malformed_request_lines() {
        for line in [
            &b"GET /\r\n"[..],
            b"GET  / HTTP/1.1\r\n",
            b"GET / HTTP/1.1 extra\r\n",
            b"GET / HTTP/1.1\n",
            b"G(T / HTTP/1.1\r\n",
            b"GET / HTTX/1.1\r\n",
        ] {
            assert_eq!(
                parse_request_line(line),
                Err(RequestError::MalformedRequestLine),
                "{:?}",
                String::from_utf8_lossy(line)
            );
        }
    }

    #[test]
    fn unsupported_version() {
        assert_eq!(
            parse_request_line(b"GET / HTTP/2.0\r\n"),
            Err(RequestError::UnsupportedVersion)
        );
    }

    #[test]
    fn request_line_size_limit() {
        // "GET / HTTP/1.1\r\n" is 16 bytes.
        let exact = LineTokenizer::new(Some(16));
        let mut c = cursor(b"GET / HTTP/1.1\r\n");
        assert!(matches!(exact.next_request_line(&mut c), Token::RequestLine(_)));

        let short = LineTokenizer::new(Some(15));
        let mut c = cursor(b"GET / HTTP/1.1\r\n");
        assert_eq!(
            short.next_request_line(&mut c),
            Token::Malformed(RequestError::RequestLineTooLong)
        );

        // Rejected before the terminator shows up.
        let mut c = cursor(b"GET / HTTP/1.1\r");
        assert_eq!(
            short.next_request_line(&mut c),
            Token::Malformed(RequestError::RequestLineTooLong)
        );
        let mut c = cursor(b"GET / HTTP/1.1");
        assert_eq!(short.next_request_line(&mut c), Token::Incomplete);
    }

    #[test]
    fn header_field() {
        let tokenizer = LineTokenizer::new(None);
        let mut c = cursor(b"Header-0: value0\r\n\r\n");
        match tokenizer.next_header_line(&mut c) {
            Token::HeaderField(h) => {
                assert_eq!(&h.name[..], b"Header-0");
                assert_eq!(&h.value[..], b"value0");
                assert_eq!(h.raw_len, 18);
            }
            other => panic!("unexpected token: {:?}", other),
        }
        assert_eq!(tokenizer.next_header_line(&mut c), Token::EndOfHeaders);
        assert_eq!(tokenizer.next_header_line(&mut c), Token::Incomplete);
    }

    #[test]
    fn header_value_whitespace_trimmed() {
        let h = parse_header_line(Bytes::from_static(b"X-Pad:\t  spaced out \t\r\n"))
            .unwrap()
            .unwrap();
        assert_eq!(&h.value[..], b"spaced out");
        let h = parse_header_line(Bytes::from_static(b"X-Empty:\r\n")).unwrap().unwrap();
        assert!(h.value.is_empty());
    }

    #[test]
    fn malformed_headers() {
        for line in [
            &b"NoColon\r\n"[..],
            b"Bad Name: x\r\n",
            b"Name : x\r\n",
            b": empty-name\r\n",
            b" folded: x\r\n",
            b"Host: a\n",
            b"Host: a\rb\r\n",
        ] {
            assert_eq!(
                parse_header_line(Bytes::copy_from_slice(line)),
                Err(RequestError::MalformedHeader),
                "{:?}",
                String::from_utf8_lossy(line)
            );
        }
    }
}
