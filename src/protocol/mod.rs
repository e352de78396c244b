//! Protocol module - line splitting and response framing.
//!
//! This module implements the text protocol spoken over the socket:
//! - Line buffer turning partial reads into `\r`/`\n`/`\r\n`-terminated lines
//! - Framed `ERRORS`/`EXCEPTION` response lines with declared payload length
//! - Client-side buffer that reassembles framed responses from partial reads

mod line_buffer;
mod response;
mod response_buffer;

pub use line_buffer::LineBuffer;
pub use response::{wire_len, FramedResponse, ResponseTag, EMPTY_EXCEPTION_MESSAGE};
pub use response_buffer::ResponseBuffer;
