//! TCP listener wrapper for the renderer side.
//!
//! The engine (client) initiates; the renderer (server) accepts. One
//! accepted stream carries exactly one session.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::error::Result;

/// TCP listener for incoming engine connections.
pub struct RenderListener {
    listener: TcpListener,
}

impl RenderListener {
    /// Bind to the given address.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Accept a single engine connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await?;
        Ok((stream, addr))
    }

    /// The locally bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_and_local_addr() {
        let listener = RenderListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_accept_connection() {
        let listener = RenderListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await });
        let (_stream, peer) = listener.accept().await.unwrap();
        assert!(client.await.unwrap().is_ok());
        assert_eq!(peer.ip(), addr.ip());
    }
}
