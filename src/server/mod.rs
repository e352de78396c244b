//! Server builder and accept loop.
//!
//! The [`ServerBuilder`] provides a fluent API for configuring the listener
//! and the compile invoker. The [`Server`] manages the lifecycle:
//! 1. Bind the TCP listener (failure is fatal to the caller)
//! 2. Accept connections one at a time
//! 3. Spawn an independent task per connection
//!
//! # Example
//!
//! ```ignore
//! use compile_service::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder()
//!         .port(10007)
//!         .serialize_compiles(true)
//!         .bind()
//!         .await?;
//!
//!     server.run_until(tokio::signal::ctrl_c()).await;
//!     Ok(())
//! }
//! ```

mod connection;

pub use connection::Connection;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{Delimiters, ServerConfig};
use crate::error::{CompileServiceError, Result};
use crate::invoker::{CompileInvoker, JavacInvoker, SerializedInvoker};
use crate::transport::TcpTransport;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Builder for configuring and binding a compile server.
pub struct ServerBuilder {
    config: ServerConfig,
    invoker: Option<Arc<dyn CompileInvoker>>,
}

impl ServerBuilder {
    /// Create a new server builder with default settings and the `javac`
    /// invoker.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            invoker: None,
        }
    }

    /// Start from a complete configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the TCP port. Default: 10007
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the payload delimiters.
    pub fn delimiters(mut self, delimiters: Delimiters) -> Self {
        self.config.delimiters = delimiters;
        self
    }

    /// Close connections that send nothing for this long.
    ///
    /// Default: no timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = Some(timeout);
        self
    }

    /// Admit one compile at a time across all connections.
    ///
    /// Default: false
    pub fn serialize_compiles(mut self, serialize: bool) -> Self {
        self.config.serialize_compiles = serialize;
        self
    }

    /// Set the longest accepted input line in bytes.
    ///
    /// Default: 1 MiB
    pub fn max_line_length(mut self, limit: usize) -> Self {
        self.config.max_line_length = limit;
        self
    }

    /// Use this compiler engine instead of `javac`.
    pub fn invoker(mut self, invoker: impl CompileInvoker) -> Self {
        self.invoker = Some(Arc::new(invoker));
        self
    }

    /// Use a shared compiler engine.
    pub fn shared_invoker(mut self, invoker: Arc<dyn CompileInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be bound. No request can ever be
    /// served in that case, so callers should treat it as fatal.
    pub async fn bind(self) -> Result<Server> {
        let invoker = self
            .invoker
            .unwrap_or_else(|| Arc::new(JavacInvoker::default()));
        let invoker: Arc<dyn CompileInvoker> = if self.config.serialize_compiles {
            Arc::new(SerializedInvoker::new(invoker))
        } else {
            invoker
        };

        let port = self.config.port;
        let transport = TcpTransport::bind(port)
            .await
            .map_err(|e| CompileServiceError::Bind {
                port,
                reason: e.to_string(),
            })?;
        info!(addr = %transport.local_addr()?, "listening");

        Ok(Server {
            transport,
            invoker,
            config: Arc::new(self.config),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound compile server.
pub struct Server {
    transport: TcpTransport,
    invoker: Arc<dyn CompileInvoker>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Get the bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Accept connections until `shutdown` completes.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until<F: Future>(self, shutdown: F) {
        let transport = &self.transport;
        accept_until(
            || transport.accept(),
            shutdown,
            |stream, peer| self.spawn_connection(stream, peer),
        )
        .await;
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        info!(%peer, "connection accepted");
        let (reader, writer) = stream.into_split();
        let connection = Connection::new(reader, writer, self.invoker.clone(), self.config.clone());

        tokio::spawn(async move {
            match connection.run().await {
                Ok(()) => debug!(%peer, "connection closed"),
                Err(CompileServiceError::IdleTimeout) => info!(%peer, "connection idle, closing"),
                Err(e) => warn!(%peer, error = %e, "connection failed"),
            }
        });
    }
}

/// Accept loop behind [`Server::run_until`].
///
/// A failed accept is logged and retried after [`ACCEPT_BACKOFF`]; only
/// `shutdown` ends the loop.
async fn accept_until<T, A, Fut, S, H>(mut accept: A, shutdown: S, mut handle: H)
where
    A: FnMut() -> Fut,
    Fut: Future<Output = Result<(T, SocketAddr)>>,
    S: Future,
    H: FnMut(T, SocketAddr),
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("listener shutting down");
                return;
            }
            accepted = accept() => match accepted {
                Ok((conn, peer)) => handle(conn, peer),
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }
}
