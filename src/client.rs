//! Client for the compile protocol.
//!
//! [`CompileClient`] speaks the same line protocol editors use: it sends an
//! options block and a file block, then waits for the framed response and
//! decodes the diagnostics.
//!
//! # Example
//!
//! ```ignore
//! use compile_service::client::CompileClient;
//! use compile_service::config::Delimiters;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = CompileClient::connect("127.0.0.1:10007", Delimiters::default()).await?;
//!
//!     let diagnostics = client
//!         .compile(&["src/A.java".to_string()], &["-g".to_string()])
//!         .await?;
//!     for d in &diagnostics {
//!         println!("{}:{}: {}", d.source.as_deref().unwrap_or("?"), d.line, d.message);
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::codec::DiagnosticCodec;
use crate::config::Delimiters;
use crate::control::ControlLine;
use crate::diagnostic::DiagnosticRecord;
use crate::error::{CompileServiceError, Result};
use crate::protocol::{FramedResponse, ResponseBuffer, ResponseTag};

/// Socket read buffer size.
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// A connection to a compile server.
pub struct CompileClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    responses: ResponseBuffer,
    /// Responses received but not yet returned.
    ready: VecDeque<FramedResponse>,
    delimiters: Delimiters,
}

impl CompileClient {
    /// Connect to a server that uses `delimiters`.
    pub async fn connect(addr: impl ToSocketAddrs, delimiters: Delimiters) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader,
            writer,
            responses: ResponseBuffer::new(),
            ready: VecDeque::new(),
            delimiters,
        })
    }

    /// Replace the options and files and compile them.
    ///
    /// # Errors
    ///
    /// Returns [`CompileServiceError::Compiler`] with the server's message for
    /// an `EXCEPTION` response, a protocol error for a file or option that
    /// cannot be sent as one data line, and IO errors from the socket.
    pub async fn compile(
        &mut self,
        files: &[String],
        options: &[String],
    ) -> Result<Vec<DiagnosticRecord>> {
        let mut message = String::new();
        push_line(&mut message, ControlLine::StartOptions.as_str());
        for option in options {
            push_data_line(&mut message, option)?;
        }
        push_line(&mut message, ControlLine::EndOptions.as_str());
        push_line(&mut message, ControlLine::Start.as_str());
        for file in files {
            push_data_line(&mut message, file)?;
        }
        push_line(&mut message, ControlLine::End.as_str());

        self.writer.write_all(message.as_bytes()).await?;
        self.receive_diagnostics().await
    }

    /// Compile the previously sent files and options again.
    pub async fn recompile(&mut self) -> Result<Vec<DiagnosticRecord>> {
        self.send_control(ControlLine::End).await?;
        self.receive_diagnostics().await
    }

    /// Send one control line.
    pub async fn send_control(&mut self, control: ControlLine) -> Result<()> {
        let mut line = String::new();
        push_line(&mut line, control.as_str());
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Wait for the next framed response.
    pub async fn read_response(&mut self) -> Result<FramedResponse> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            if let Some(response) = self.ready.pop_front() {
                return Ok(response);
            }
            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                return Err(CompileServiceError::ConnectionClosed);
            }
            self.ready.extend(self.responses.push(&buf[..n])?);
        }
    }

    /// Say goodbye and close the connection.
    pub async fn close(mut self) -> Result<()> {
        self.send_control(ControlLine::Bye).await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn receive_diagnostics(&mut self) -> Result<Vec<DiagnosticRecord>> {
        let response = self.read_response().await?;
        let body = response.body(&self.delimiters);
        match response.tag {
            ResponseTag::Errors => DiagnosticCodec::decode(body, &self.delimiters),
            ResponseTag::Exception => Err(CompileServiceError::Compiler(body.to_string())),
        }
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

/// Data lines must survive line splitting and must not be read as control
/// lines.
fn push_data_line(out: &mut String, line: &str) -> Result<()> {
    if line.contains(['\r', '\n']) {
        return Err(CompileServiceError::Protocol(format!(
            "Line break in data line: {line:?}"
        )));
    }
    if ControlLine::parse(line).is_some() {
        return Err(CompileServiceError::Protocol(format!(
            "Data line collides with control line: {line:?}"
        )));
    }
    push_line(out, line);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_data_line_rejects_line_breaks() {
        let mut out = String::new();
        assert!(push_data_line(&mut out, "A.java\nEND").is_err());
        assert!(push_data_line(&mut out, "A.java\r").is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_push_data_line_rejects_control_lines() {
        let mut out = String::new();
        assert!(push_data_line(&mut out, "END").is_err());
        assert!(push_data_line(&mut out, "Bye.").is_err());
        assert!(push_data_line(&mut out, "end").is_ok());
        assert_eq!(out, "end\n");
    }
}
