//! Response output.
//!
//! [`ResponseWriter`] writes one framed response per `END` as a single line
//! terminated by `\n` and flushes it immediately, so the client never waits
//! on a buffered response. [`write_stdout_line`] does the same for the
//! single-shot command line mode.
//!
//! Logs go to stderr; stdout carries only responses.

use std::io::Write;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::protocol::FramedResponse;

/// Writes framed responses to one connection.
pub struct ResponseWriter<W> {
    writer: W,
    /// Reused line buffer.
    line: BytesMut,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            line: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Write one response line and flush.
    ///
    /// The line goes out in a single `write_all`, so a response is never
    /// interleaved with anything else on the socket.
    ///
    /// # Errors
    ///
    /// Returns IO error if the peer is gone.
    pub async fn send(&mut self, response: &FramedResponse) -> Result<()> {
        self.line.clear();
        self.line.put_slice(response.to_line().as_bytes());
        self.line.put_u8(b'\n');

        self.writer.write_all(&self.line).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Shut down the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Write a line to stdout.
///
/// Writes the string followed by a single `\n` and flushes.
/// Uses explicit `\n`, NOT `println!`.
///
/// # Errors
///
/// Returns IO error if write or flush fails.
pub fn write_stdout_line(line: &str) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(line.as_bytes())?;
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Delimiters, END_SENTINEL};
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_send_writes_line_with_newline() {
        let (client, server) = duplex(1024);
        let mut writer = ResponseWriter::new(server);

        let response = FramedResponse::errors(END_SENTINEL.to_string());
        writer.send(&response).await.unwrap();
        drop(writer);

        let mut received = String::new();
        let mut client = client;
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, format!("ERRORS:{}:{}\n", END_SENTINEL.len(), END_SENTINEL));
    }

    #[tokio::test]
    async fn test_consecutive_responses() {
        let d = Delimiters::default();
        let mut writer = ResponseWriter::new(Vec::new());

        writer.send(&FramedResponse::errors(END_SENTINEL.to_string())).await.unwrap();
        writer.send(&FramedResponse::exception("boom", &d)).await.unwrap();

        let out = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ERRORS:"));
        assert_eq!(lines[1], format!("EXCEPTION:{}:boom{}", 4 + END_SENTINEL.len(), END_SENTINEL));
    }

    #[tokio::test]
    async fn test_send_to_closed_peer_fails() {
        let (client, server) = duplex(64);
        drop(client);
        let mut writer = ResponseWriter::new(server);

        let result = writer.send(&FramedResponse::errors(END_SENTINEL.to_string())).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_write_stdout_line_does_not_panic() {
        let result = write_stdout_line("ERRORS:0:");
        assert!(result.is_ok());
    }
}
