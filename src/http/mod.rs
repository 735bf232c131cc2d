//! HTTP/1.1 protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, config snapshot, task per connection)
//!     → connection.rs (read loop, timeouts, keep-alive)
//!     → cursor.rs (buffered bytes, line extraction)
//!     → tokenizer.rs (request line / header line / end of headers)
//!     → parser.rs (phase machine + header limit guard)
//!     ├─ refused  → response.rs RejectionResponder → close
//!     └─ accepted → handler.rs → response.rs → next request
//! ```

pub mod connection;
pub mod cursor;
pub mod date;
pub mod error;
pub mod handler;
pub mod parser;
pub mod request;
pub mod response;
pub mod server;
pub mod tokenizer;

pub use connection::{Connection, ConnectionEnd, ConnectionSettings};
pub use cursor::ByteCursor;
pub use date::DateCache;
pub use error::RequestError;
pub use handler::{Handler, HelloWorld};
pub use parser::{ParseState, ParseStatus, Phase, RequestHeaderParser};
pub use request::{HeaderField, HeaderSet, RequestHead, RequestLine};
pub use response::{RejectionResponder, Response};
pub use server::HttpServer;
pub use tokenizer::{HeaderLine, LineTokenizer, Token};
