//! Client-side reassembly of framed responses.
//!
//! Responses can arrive split across reads, and one read can hold several
//! responses. The payload may contain line breaks, so the declared length,
//! not the line terminator, decides where a response ends:
//! - `WaitingForHeader`: need `TAG:<len>:`
//! - `WaitingForPayload`: header parsed, need `remaining` more length units
//!
//! The line terminator written after each response is skipped before the
//! next header.

use bytes::{Buf, BytesMut};

use super::response::{FramedResponse, ResponseTag};
use crate::error::{CompileServiceError, Result};

/// Longest header prefix accepted before the length digits (`EXCEPTION:`).
const MAX_TAG_LENGTH: usize = 16;

/// Longest run of length digits accepted.
const MAX_LENGTH_DIGITS: usize = 19;

#[derive(Debug)]
enum State {
    WaitingForHeader,
    WaitingForPayload {
        tag: ResponseTag,
        declared_length: usize,
        remaining: usize,
        payload: String,
    },
}

/// Buffer for accumulating response bytes and extracting complete responses.
pub struct ResponseBuffer {
    buffer: BytesMut,
    state: State,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForHeader,
        }
    }

    /// Push data into the buffer and extract all complete responses.
    ///
    /// # Errors
    ///
    /// Returns error on an unknown tag, a malformed length, invalid UTF-8 or
    /// a length that ends inside a surrogate pair.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<FramedResponse>> {
        self.buffer.extend_from_slice(data);

        let mut responses = Vec::new();
        while let Some(response) = self.try_extract_one()? {
            responses.push(response);
        }
        Ok(responses)
    }

    /// True when no partial response is buffered.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::WaitingForHeader)
            && self.buffer.iter().all(|&b| b == b'\r' || b == b'\n')
    }

    fn try_extract_one(&mut self) -> Result<Option<FramedResponse>> {
        match std::mem::replace(&mut self.state, State::WaitingForHeader) {
            State::WaitingForHeader => {
                let Some((tag, declared_length)) = self.try_parse_header()? else {
                    return Ok(None);
                };
                self.state = State::WaitingForPayload {
                    tag,
                    declared_length,
                    remaining: declared_length,
                    payload: String::new(),
                };
                self.try_extract_one()
            }

            State::WaitingForPayload {
                tag,
                declared_length,
                mut remaining,
                mut payload,
            } => {
                let consumed = {
                    let (text, invalid) = decodable_prefix(&self.buffer);
                    let mut consumed = 0;
                    for ch in text.chars() {
                        if remaining == 0 {
                            break;
                        }
                        let units = ch.len_utf16();
                        if units > remaining {
                            return Err(CompileServiceError::Protocol(
                                "Declared length ends inside a character".to_string(),
                            ));
                        }
                        remaining -= units;
                        consumed += ch.len_utf8();
                    }
                    if remaining > 0 && invalid {
                        return Err(CompileServiceError::Protocol(
                            "Invalid UTF-8 in response payload".to_string(),
                        ));
                    }
                    consumed
                };

                let chunk = self.buffer.split_to(consumed);
                payload.push_str(decodable_prefix(&chunk).0);

                if remaining > 0 {
                    self.state = State::WaitingForPayload {
                        tag,
                        declared_length,
                        remaining,
                        payload,
                    };
                    return Ok(None);
                }

                Ok(Some(FramedResponse {
                    tag,
                    declared_length,
                    payload,
                }))
            }
        }
    }

    /// Parse `TAG:<len>:` and consume it. Returns `None` if incomplete.
    fn try_parse_header(&mut self) -> Result<Option<(ResponseTag, usize)>> {
        let skip = self
            .buffer
            .iter()
            .take_while(|&&b| b == b'\r' || b == b'\n')
            .count();
        self.buffer.advance(skip);

        let Some(tag_end) = self.buffer.iter().position(|&b| b == b':') else {
            if self.buffer.len() > MAX_TAG_LENGTH {
                return Err(CompileServiceError::Protocol(
                    "Missing response tag".to_string(),
                ));
            }
            return Ok(None);
        };

        let tag: ResponseTag = String::from_utf8_lossy(&self.buffer[..tag_end]).parse()?;

        let digits = &self.buffer[tag_end + 1..];
        let Some(len_end) = digits.iter().position(|&b| b == b':') else {
            if digits.len() > MAX_LENGTH_DIGITS || !digits.iter().all(u8::is_ascii_digit) {
                return Err(CompileServiceError::Protocol(
                    "Malformed response length".to_string(),
                ));
            }
            return Ok(None);
        };

        let declared_length = std::str::from_utf8(&digits[..len_end])
            .ok()
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| {
                CompileServiceError::Protocol("Malformed response length".to_string())
            })?;

        self.buffer.advance(tag_end + 1 + len_end + 1);
        Ok(Some((tag, declared_length)))
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// The longest valid UTF-8 prefix of `bytes`, and whether it stops at an
/// invalid sequence rather than at an incomplete one.
fn decodable_prefix(bytes: &[u8]) -> (&str, bool) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (s, false),
        Err(e) => (
            std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
            e.error_len().is_some(),
        ),
    }
}
