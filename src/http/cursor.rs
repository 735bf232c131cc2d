//! Resumable line cursor over incoming socket bytes.

use bytes::{Bytes, BytesMut};

const INITIAL_CAPACITY: usize = 4 * 1024;

/// Buffer of received-but-unconsumed bytes.
///
/// Bytes are appended as they arrive and handed out one complete line at a
/// time. A line is never returned partially. The cursor remembers how far it
/// has already searched for a line feed, so repeated calls while a long line
/// trickles in never rescan the same bytes.
#[derive(Debug)]
pub struct ByteCursor {
    buf: BytesMut,
    /// Prefix of `buf` known not to contain `\n`.
    scanned: usize,
}

impl ByteCursor {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            scanned: 0,
        }
    }

    /// Add newly arrived bytes to the tail.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Tail buffer for direct socket reads (`AsyncReadExt::read_buf`).
    pub fn buf_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Take the next complete line, terminator included.
    ///
    /// Returns `None` and consumes nothing when no line feed has arrived yet.
    pub fn try_read_line(&mut self) -> Option<Bytes> {
        let end = self.find_line_end()?;
        self.scanned = 0;
        Some(self.buf.split_to(end).freeze())
    }

    /// Unconsumed bytes, without consuming them.
    pub fn peek(&self) -> &[u8] {
        &self.buf
    }

    /// Number of unconsumed bytes.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }

    fn find_line_end(&mut self) -> Option<usize> {
        match memchr::memchr(b'\n', &self.buf[self.scanned..]) {
            Some(pos) => Some(self.scanned + pos + 1),
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }
}

impl Default for ByteCursor {
    fn default() -> Self {
        Self::new()
    }
}
