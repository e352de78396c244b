//! TCP listener.
//!
//! # Example
//!
//! ```ignore
//! use compile_service::transport::TcpTransport;
//!
//! let transport = TcpTransport::bind(10007).await?;
//! let (stream, peer) = transport.accept().await?;
//! ```

use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::{TcpListener, TcpStream};

use crate::error::Result;

/// Listening TCP socket.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind to `port` on all IPv4 interfaces. Port `0` picks a free port.
    pub async fn bind(port: u16) -> Result<Self> {
        Self::bind_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
    }

    /// Bind to an explicit address.
    pub async fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Accept a single connection.
    ///
    /// Nagle is disabled on the accepted stream; responses are written as
    /// one line and flushed, and the client is waiting on them.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok((stream, peer))
    }

    /// Get the bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
