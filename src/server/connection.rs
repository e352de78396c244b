//! Connection handler: one client connection from accept to close.
//!
//! Reads bytes, splits them into lines, feeds the request accumulator and
//! answers every `END` with exactly one framed response. Handling within a
//! connection is strictly sequential: the next line is not looked at until
//! the current compile has been answered.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, trace};

use crate::config::ServerConfig;
use crate::control::{AccumulatorEvent, RequestAccumulator};
use crate::error::{CompileServiceError, Result};
use crate::invoker::CompileInvoker;
use crate::protocol::LineBuffer;
use crate::service;
use crate::writer::ResponseWriter;

/// Socket read buffer size.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Whether the read loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Per-connection state.
pub struct Connection<R, W> {
    reader: R,
    writer: ResponseWriter<W>,
    lines: LineBuffer,
    accumulator: RequestAccumulator,
    invoker: Arc<dyn CompileInvoker>,
    config: Arc<ServerConfig>,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        reader: R,
        writer: W,
        invoker: Arc<dyn CompileInvoker>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            reader,
            writer: ResponseWriter::new(writer),
            lines: LineBuffer::with_max_line_length(config.max_line_length),
            accumulator: RequestAccumulator::new(),
            invoker,
            config,
        }
    }

    /// Run until `Bye.`, end of input, or an I/O fault.
    ///
    /// # Errors
    ///
    /// Socket errors, an oversized line and the idle timeout end the
    /// connection with an error. Compile failures do not; they are answered
    /// with `EXCEPTION` responses.
    pub async fn run(mut self) -> Result<()> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                if let Some(line) = self.lines.finish() {
                    self.handle_line(&line).await?;
                }
                debug!("peer closed connection");
                return Ok(());
            }

            for line in self.lines.push(&buf[..n])? {
                if self.handle_line(&line).await? == Flow::Close {
                    debug!("client said goodbye");
                    // Best effort: the client may already be gone.
                    let _ = self.writer.shutdown().await;
                    return Ok(());
                }
            }
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.config.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.reader.read(buf))
                .await
                .map_err(|_| CompileServiceError::IdleTimeout)?
                .map_err(CompileServiceError::Io),
            None => self.reader.read(buf).await.map_err(CompileServiceError::Io),
        }
    }

    async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        trace!(line, "received");
        match self.accumulator.feed(line) {
            AccumulatorEvent::Continue => Ok(Flow::Continue),
            AccumulatorEvent::Close => Ok(Flow::Close),
            AccumulatorEvent::Compile(request) => {
                debug!(
                    files = request.files.len(),
                    options = request.options.len(),
                    "compile requested"
                );
                let response =
                    service::compile(self.invoker.as_ref(), request, &self.config.delimiters)
                        .await;
                self.writer.send(&response).await?;
                Ok(Flow::Continue)
            }
        }
    }
}
