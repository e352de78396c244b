//! Line buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` to hold unterminated input between socket reads.
//! A line ends at `\n`, `\r` or `\r\n`; the terminator is stripped. The
//! state machine remembers a trailing `\r` so that a `\n` arriving at the
//! start of the next read completes the same terminator:
//! - `Scanning`: looking for the next terminator
//! - `AfterCarriageReturn`: last terminator was `\r`, swallow one leading `\n`
//!
//! # Example
//!
//! ```
//! use compile_service::protocol::LineBuffer;
//!
//! let mut buffer = LineBuffer::new();
//!
//! let lines = buffer.push(b"START\r\n/tmp/A.ja").unwrap();
//! assert_eq!(lines, vec!["START"]);
//!
//! let lines = buffer.push(b"va\nEND\n").unwrap();
//! assert_eq!(lines, vec!["/tmp/A.java", "END"]);
//! ```

use bytes::{Buf, BytesMut};

use crate::config::DEFAULT_MAX_LINE_LENGTH;
use crate::error::{CompileServiceError, Result};

/// State machine for line splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    AfterCarriageReturn,
}

/// Buffer for accumulating incoming bytes and extracting complete lines.
pub struct LineBuffer {
    /// Bytes received but not yet terminated.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed line length in bytes.
    max_line_length: usize,
}

impl LineBuffer {
    /// Create a new line buffer with the default 1 MiB line limit.
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a new line buffer with a custom line limit.
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::Scanning,
            max_line_length,
        }
    }

    /// Push data into the buffer and extract all complete lines.
    ///
    /// Bytes are decoded as UTF-8; invalid sequences are replaced.
    ///
    /// # Errors
    ///
    /// Returns error if a line grows beyond the configured limit.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(line) = self.try_extract_one()? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Take the trailing unterminated line at end of input, if any.
    pub fn finish(&mut self) -> Option<String> {
        self.state = State::Scanning;
        if self.buffer.is_empty() {
            return None;
        }
        let rest = self.buffer.split();
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    fn try_extract_one(&mut self) -> Result<Option<String>> {
        if self.state == State::AfterCarriageReturn {
            match self.buffer.first() {
                None => return Ok(None),
                Some(b'\n') => {
                    self.buffer.advance(1);
                    self.state = State::Scanning;
                }
                Some(_) => self.state = State::Scanning,
            }
        }

        let end = match self.buffer.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(end) => end,
            None => {
                if self.buffer.len() > self.max_line_length {
                    return Err(self.too_long(self.buffer.len()));
                }
                return Ok(None);
            }
        };

        if end > self.max_line_length {
            return Err(self.too_long(end));
        }

        let line = self.buffer.split_to(end);
        if self.buffer[0] == b'\r' {
            self.state = State::AfterCarriageReturn;
        }
        self.buffer.advance(1);

        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    fn too_long(&self, len: usize) -> CompileServiceError {
        CompileServiceError::Protocol(format!(
            "Line length {} exceeds maximum {}",
            len, self.max_line_length
        ))
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::Scanning => "Scanning",
            State::AfterCarriageReturn => "AfterCarriageReturn",
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
