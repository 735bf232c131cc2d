//! Request head state machine.
//!
//! ```text
//! RequestLine ──request line──▶ Headers ──empty line──▶ Complete
//!      │                           │  ▲
//!      │                           └──┘ header field (guarded)
//!      ▼                           ▼
//!   Rejected ◀─────────────────────┘
//! ```
//!
//! The parser is driven by the connection task: every time new bytes land in
//! the [`ByteCursor`] it calls [`RequestHeaderParser::parse`], which consumes
//! as many whole lines as are available and then reports `Incomplete`,
//! `Complete` or an error. Nothing is ever re-read; counters only move forward.

use crate::security::{HeaderLimitGuard, HeaderLimits};

use super::cursor::ByteCursor;
use super::error::RequestError;
use super::request::{HeaderField, HeaderSet, RequestHead, RequestLine};
use super::tokenizer::{LineTokenizer, Token};

/// Where the parser is within the current request head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RequestLine,
    Headers,
    Complete,
    Rejected(RequestError),
}

/// Progress report from [`RequestHeaderParser::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseStatus {
    /// More bytes are needed.
    Incomplete,
    /// The head is complete; any following bytes belong to the body or the
    /// next request and are left in the cursor.
    Complete(RequestHead),
}

/// Snapshot of the parser's counters, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseState {
    pub phase: Phase,
    pub headers_seen: usize,
    pub bytes_seen: usize,
}

/// Incremental request head parser with header limit enforcement.
#[derive(Debug)]
pub struct RequestHeaderParser {
    tokenizer: LineTokenizer,
    guard: HeaderLimitGuard,
    phase: Phase,
    request_line: Option<RequestLine>,
    headers: HeaderSet,
}

impl RequestHeaderParser {
    pub fn new(limits: HeaderLimits) -> Self {
        Self {
            tokenizer: LineTokenizer::new(limits.max_request_line_size),
            guard: HeaderLimitGuard::new(limits),
            phase: Phase::RequestLine,
            request_line: None,
            headers: HeaderSet::new(),
        }
    }

    /// Consume buffered lines and advance.
    ///
    /// Once rejected, every call returns the same error and consumes nothing.
    /// Once complete, calls consume nothing until [`reset`](Self::reset).
    pub fn parse(&mut self, cursor: &mut ByteCursor) -> Result<ParseStatus, RequestError> {
        loop {
            match self.phase {
                Phase::RequestLine => match self.tokenizer.next_request_line(cursor) {
                    Token::Incomplete => return Ok(ParseStatus::Incomplete),
                    Token::RequestLine(line) => {
                        self.request_line = Some(line);
                        self.phase = Phase::Headers;
                    }
                    Token::Malformed(e) => return Err(self.reject(e)),
                    Token::HeaderField(_) | Token::EndOfHeaders => {
                        return Err(self.reject(RequestError::MalformedRequestLine))
                    }
                },
                Phase::Headers => match self.tokenizer.next_header_line(cursor) {
                    Token::Incomplete => {
                        self.check_partial_line(cursor)?;
                        return Ok(ParseStatus::Incomplete);
                    }
                    Token::HeaderField(header) => {
                        if let Err(reason) = self.guard.check_and_record(header.raw_len) {
                            return Err(self.reject(reason.into()));
                        }
                        self.headers.push(HeaderField::new(header.name, header.value));
                    }
                    Token::EndOfHeaders => {
                        let Some(line) = self.request_line.take() else {
                            return Err(self.reject(RequestError::MalformedRequestLine));
                        };
                        self.phase = Phase::Complete;
                        let headers = std::mem::take(&mut self.headers);
                        return Ok(ParseStatus::Complete(RequestHead::new(line, headers)));
                    }
                    Token::Malformed(e) => return Err(self.reject(e)),
                    Token::RequestLine(_) => return Err(self.reject(RequestError::MalformedHeader)),
                },
                Phase::Complete => return Ok(ParseStatus::Incomplete),
                Phase::Rejected(e) => return Err(e),
            }
        }
    }

    /// Prepare for the next request on a kept-alive connection.
    ///
    /// Only a completed request can be followed by another one; returns
    /// `false` and changes nothing otherwise.
    pub fn reset(&mut self) -> bool {
        if self.phase != Phase::Complete {
            return false;
        }
        self.guard.reset();
        self.phase = Phase::RequestLine;
        self.request_line = None;
        self.headers = HeaderSet::new();
        true
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the request line has been read and headers are still arriving.
    pub fn in_progress(&self) -> bool {
        self.phase == Phase::Headers
    }

    pub fn state(&self) -> ParseState {
        ParseState {
            phase: self.phase,
            headers_seen: self.guard.headers_seen(),
            bytes_seen: self.guard.bytes_seen(),
        }
    }

    pub fn limits(&self) -> &HeaderLimits {
        self.guard.limits()
    }

    /// Refuse an unterminated header line that can no longer be admitted.
    ///
    /// The line will be at least one byte longer than what is buffered, so
    /// checking that lower bound gives the verdict the complete line would
    /// get. A lone `\r` may still become the empty line ending the head.
    fn check_partial_line(&mut self, cursor: &ByteCursor) -> Result<(), RequestError> {
        let pending = cursor.peek();
        if pending.is_empty() || pending == b"\r" {
            return Ok(());
        }
        if let Err(reason) = self.guard.check(pending.len() + 1) {
            return Err(self.reject(reason.into()));
        }
        Ok(())
    }

    fn reject(&mut self, error: RequestError) -> RequestError {
        self.phase = Phase::Rejected(error);
        self.request_line = None;
        self.headers = HeaderSet::new();
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::RejectionReason;
    use http::Method;

    fn make_headers(count: usize) -> String {
        (0..count).map(|i| format!("Header-{i}: value{i}\r\n")).collect()
    }

    fn request(headers: &str) -> Vec<u8> {
        format!("GET / HTTP/1.1\r\n{headers}\r\n").into_bytes()
    }

    /// Feed `input` in `chunk`-sized pieces until the parser settles.
    fn run(
        limits: HeaderLimits,
        input: &[u8],
        chunk: usize,
    ) -> (Result<ParseStatus, RequestError>, ParseState) {
        let mut parser = RequestHeaderParser::new(limits);
        let mut cursor = ByteCursor::new();
        let mut last = Ok(ParseStatus::Incomplete);
        for piece in input.chunks(chunk) {
            cursor.append(piece);
            last = parser.parse(&mut cursor);
            if !matches!(last, Ok(ParseStatus::Incomplete)) {
                break;
            }
        }
        (last, parser.state())
    }

    fn complete(result: Result<ParseStatus, RequestError>) -> RequestHead {
        match result {
            Ok(ParseStatus::Complete(head)) => head,
            other => panic!("expected complete head, got {:?}", other),
        }
    }

    #[test]
    fn parses_simple_request() {
        let input = request(&make_headers(2));
        let (result, state) = run(HeaderLimits::default(), &input, input.len());
        let head = complete(result);
        assert_eq!(head.method, Method::GET);
        assert_eq!(head.target, "/");
        assert_eq!(head.headers.get("header-1"), Some(&b"value1"[..]));
        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.headers_seen, 2);
        assert_eq!(state.bytes_seen, 36);
    }

    #[test]
    fn count_limit_scenario() {
        let limits = HeaderLimits::unbounded().with_max_header_count(1);

        let (result, _) = run(limits, &request(""), 1);
        assert!(complete(result).headers.is_empty());

        let (result, state) = run(limits, &request(&make_headers(2)), 1024);
        assert_eq!(
            result,
            Err(RequestError::Limit(RejectionReason::HeaderCountExceeded))
        );
        assert_eq!(state.headers_seen, 1);
        assert_eq!(state.phase, Phase::Rejected(RejectionReason::HeaderCountExceeded.into()));
    }

    #[test]
    fn count_limit_matrix() {
        for (count, max, ok) in [
            (0, 1, true),
            (1, 1, true),
            (5, 5, true),
            (5, 1337, true),
            (2, 1, false),
            (5, 1, false),
            (5, 4, false),
        ] {
            let limits = HeaderLimits::unbounded().with_max_header_count(max);
            let (result, _) = run(limits, &request(&make_headers(count)), 7);
            assert_eq!(result.is_ok(), ok, "count={count} max={max}");
        }
    }

    #[test]
    fn size_limit_is_exact() {
        let headers = make_headers(5);
        assert_eq!(headers.len(), 90);

        let exact = HeaderLimits::unbounded().with_max_headers_total_size(headers.len());
        let (result, state) = run(exact, &request(&headers), 4096);
        assert_eq!(complete(result).headers.len(), 5);
        assert_eq!(state.bytes_seen, 90);

        let short = HeaderLimits::unbounded().with_max_headers_total_size(headers.len() - 1);
        let (result, _) = run(short, &request(&headers), 4096);
        assert_eq!(
            result,
            Err(RequestError::Limit(RejectionReason::HeaderTotalSizeExceeded))
        );
    }

    #[test]
    fn outcome_does_not_depend_on_chunking() {
        let headers = make_headers(5);
        let input = request(&headers);
        let cases = [
            HeaderLimits::unbounded(),
            HeaderLimits::unbounded().with_max_headers_total_size(headers.len()),
            HeaderLimits::unbounded().with_max_headers_total_size(headers.len() - 1),
            HeaderLimits::unbounded().with_max_headers_total_size(1),
            HeaderLimits::unbounded().with_max_header_count(4),
            HeaderLimits::unbounded().with_max_header_count(5),
        ];
        for limits in cases {
            let (whole, whole_state) = run(limits, &input, input.len());
            for chunk in [1, 2, 3, 5, 17, 18, 19, 64] {
                let (split, split_state) = run(limits, &input, chunk);
                assert_eq!(split, whole, "limits={limits:?} chunk={chunk}");
                if whole.is_ok() {
                    assert_eq!(split_state, whole_state, "limits={limits:?} chunk={chunk}");
                }
            }
        }
    }

    #[test]
    fn rejected_header_is_not_counted() {
        let limits = HeaderLimits::unbounded().with_max_headers_total_size(30);
        let (result, state) = run(limits, &request(&make_headers(2)), 4096);
        assert!(result.is_err());
        assert_eq!(state.headers_seen, 1);
        assert_eq!(state.bytes_seen, 18);
    }

    #[test]
    fn request_line_is_not_counted() {
        let long_target = format!("/{}", "a".repeat(500));
        let input = format!("GET {long_target} HTTP/1.1\r\nA: b\r\n\r\n");
        let limits = HeaderLimits::unbounded().with_max_headers_total_size(6);
        let (result, state) = run(limits, input.as_bytes(), 4096);
        assert_eq!(complete(result).target, long_target);
        assert_eq!(state.bytes_seen, 6);
    }

    #[test]
    fn oversized_partial_line_rejected_early() {
        let limits = HeaderLimits::unbounded().with_max_headers_total_size(10);
        let mut parser = RequestHeaderParser::new(limits);
        let mut cursor = ByteCursor::new();
        cursor.append(b"GET / HTTP/1.1\r\nX-Long: ");
        assert_eq!(parser.parse(&mut cursor), Ok(ParseStatus::Incomplete));
        cursor.append(b"aa");
        assert_eq!(
            parser.parse(&mut cursor),
            Err(RequestError::Limit(RejectionReason::HeaderTotalSizeExceeded))
        );
    }

    #[test]
    fn lone_cr_at_budget_is_not_rejected() {
        let headers = make_headers(1);
        let limits = HeaderLimits::unbounded().with_max_headers_total_size(headers.len());
        let mut parser = RequestHeaderParser::new(limits);
        let mut cursor = ByteCursor::new();
        cursor.append(format!("GET / HTTP/1.1\r\n{headers}\r").as_bytes());
        assert_eq!(parser.parse(&mut cursor), Ok(ParseStatus::Incomplete));
        cursor.append(b"\n");
        assert!(matches!(parser.parse(&mut cursor), Ok(ParseStatus::Complete(_))));
    }

    #[test]
    fn rejection_is_sticky() {
        let limits = HeaderLimits::unbounded().with_max_header_count(0);
        let mut parser = RequestHeaderParser::new(limits);
        let mut cursor = ByteCursor::new();
        cursor.append(b"GET / HTTP/1.1\r\nA: b\r\n\r\nGET / HTTP/1.1\r\n\r\n");
        let err = parser.parse(&mut cursor).unwrap_err();
        let remaining = cursor.pending();
        assert_eq!(parser.parse(&mut cursor), Err(err));
        assert_eq!(cursor.pending(), remaining);
        assert!(!parser.reset());
    }

    #[test]
    fn malformed_is_not_a_limit() {
        let (result, _) = run(HeaderLimits::default(), b"GET / HTTP/1.1\r\nBroken\r\n\r\n", 3);
        assert_eq!(result, Err(RequestError::MalformedHeader));

        let (result, _) = run(HeaderLimits::default(), b"NOT-HTTP\r\n", 3);
        assert_eq!(result, Err(RequestError::MalformedRequestLine));
    }

    #[test]
    fn keep_alive_reset_and_pipelining() {
        let limits = HeaderLimits::unbounded().with_max_header_count(1);
        let mut parser = RequestHeaderParser::new(limits);
        let mut cursor = ByteCursor::new();
        cursor.append(b"GET /a HTTP/1.1\r\nA: 1\r\n\r\nGET /b HTTP/1.1\r\nB: 2\r\n\r\n");

        let first = complete(parser.parse(&mut cursor));
        assert_eq!(first.target, "/a");
        // Stays complete until reset.
        assert_eq!(parser.parse(&mut cursor), Ok(ParseStatus::Incomplete));

        assert!(parser.reset());
        assert_eq!(parser.state().headers_seen, 0);
        let second = complete(parser.parse(&mut cursor));
        assert_eq!(second.target, "/b");
        assert_eq!(second.headers.get("b"), Some(&b"2"[..]));
        assert!(cursor.is_empty());
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let (result, _) = run(
            HeaderLimits::default(),
            b"GET / HTTP/1.1\r\nSet: 1\r\nOther: x\r\nset: 2\r\n\r\n",
            4096,
        );
        let head = complete(result);
        let values: Vec<&[u8]> = head.headers.get_all("SET").collect();
        assert_eq!(values, vec![&b"1"[..], &b"2"[..]]);
    }
}
