//! Framed response line.
//!
//! Wire format (one line, terminated by `\n` by the writer):
//! ```text
//! ERRORS:<len>:<payload><sentinel>
//! EXCEPTION:<len>:<message><sentinel>
//! ```
//!
//! `<len>` counts the length units of everything after the second colon,
//! sentinel included. Length units are UTF-16 code units, the string length
//! both the Java compiler host and JavaScript clients report; for ASCII
//! payloads this is the character count.

use std::fmt;
use std::str::FromStr;

use crate::config::Delimiters;
use crate::error::CompileServiceError;

/// Message used when a compile failure carries no text.
pub const EMPTY_EXCEPTION_MESSAGE: &str = "compiler invocation failed";

/// Length of `s` in wire length units (UTF-16 code units).
#[inline]
pub fn wire_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Response kind carried in the line prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseTag {
    /// The compile ran; payload holds encoded diagnostics.
    Errors,
    /// The compile failed; payload holds the failure message.
    Exception,
}

impl ResponseTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseTag::Errors => "ERRORS",
            ResponseTag::Exception => "EXCEPTION",
        }
    }
}

impl fmt::Display for ResponseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseTag {
    type Err = CompileServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ERRORS" => Ok(ResponseTag::Errors),
            "EXCEPTION" => Ok(ResponseTag::Exception),
            other => Err(CompileServiceError::Protocol(format!(
                "Unknown response tag: {other:?}"
            ))),
        }
    }
}

/// One complete response to an `END` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedResponse {
    pub tag: ResponseTag,
    /// Length units following the second colon, sentinel included.
    pub declared_length: usize,
    /// Everything after the second colon, sentinel included.
    pub payload: String,
}

impl FramedResponse {
    /// Frame an encoded diagnostics payload. The payload must already end
    /// with the sentinel; the length is measured over the whole payload.
    pub fn errors(payload: String) -> Self {
        Self {
            tag: ResponseTag::Errors,
            declared_length: wire_len(&payload),
            payload,
        }
    }

    /// Frame a compile failure.
    ///
    /// The length is the message length plus the sentinel length, summed
    /// separately. An empty message is replaced by
    /// [`EMPTY_EXCEPTION_MESSAGE`].
    pub fn exception(message: &str, delimiters: &Delimiters) -> Self {
        let message = if message.is_empty() {
            EMPTY_EXCEPTION_MESSAGE
        } else {
            message
        };
        let sentinel = delimiters.sentinel();
        Self {
            tag: ResponseTag::Exception,
            declared_length: wire_len(message) + wire_len(sentinel),
            payload: format!("{message}{sentinel}"),
        }
    }

    /// Payload with the trailing sentinel removed, if present.
    pub fn body<'a>(&'a self, delimiters: &Delimiters) -> &'a str {
        self.payload
            .strip_suffix(delimiters.sentinel())
            .unwrap_or(&self.payload)
    }

    /// The full response line, without the line terminator.
    pub fn to_line(&self) -> String {
        self.to_string()
    }

    pub fn is_exception(&self) -> bool {
        self.tag == ResponseTag::Exception
    }
}

impl fmt::Display for FramedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.tag, self.declared_length, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::END_SENTINEL;

    #[test]
    fn test_errors_length_covers_sentinel() {
        let response = FramedResponse::errors(END_SENTINEL.to_string());
        assert_eq!(response.declared_length, END_SENTINEL.len());
        assert_eq!(response.to_line(), format!("ERRORS:{}:{}", END_SENTINEL.len(), END_SENTINEL));
    }

    #[test]
    fn test_exception_line() {
        let d = Delimiters::default();
        let response = FramedResponse::exception("disk read error", &d);

        assert_eq!(response.declared_length, "disk read error".len() + END_SENTINEL.len());
        assert_eq!(
            response.to_line(),
            format!("EXCEPTION:{}:disk read error{}", response.declared_length, END_SENTINEL)
        );
        assert!(response.is_exception());
        assert_eq!(response.body(&d), "disk read error");
    }

    #[test]
    fn test_exception_empty_message_fallback() {
        let d = Delimiters::default();
        let response = FramedResponse::exception("", &d);
        assert_eq!(response.body(&d), EMPTY_EXCEPTION_MESSAGE);
        assert_eq!(
            response.declared_length,
            EMPTY_EXCEPTION_MESSAGE.len() + END_SENTINEL.len()
        );
    }

    #[test]
    fn test_wire_len_counts_utf16_units() {
        assert_eq!(wire_len("abc"), 3);
        assert_eq!(wire_len("é"), 1);
        // Outside the BMP: one char, two UTF-16 units.
        assert_eq!(wire_len("𝄞"), 2);
    }

    #[test]
    fn test_tag_parsing() {
        assert_eq!("ERRORS".parse::<ResponseTag>().unwrap(), ResponseTag::Errors);
        assert_eq!("EXCEPTION".parse::<ResponseTag>().unwrap(), ResponseTag::Exception);
        assert!("errors".parse::<ResponseTag>().is_err());
    }
}
