//! Renderer-side server: accept engine connections and run one dispatch
//! pipeline per connection.
//!
//! Connections are fully independent: each gets its own task, its own
//! [`DispatchLoop`] and therefore its own reassembly buffers and lifecycle
//! state. Nothing mutable is shared across connections.

use std::net::SocketAddr;

use tokio::net::ToSocketAddrs;
use tracing::{error, info};

use crate::dispatch::DispatchLoop;
use crate::error::Result;
use crate::transport::RenderListener;

/// Accept loop for the renderer side.
pub struct RenderServer {
    listener: RenderListener,
}

impl RenderServer {
    /// Bind the server to the given address.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = RenderListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// The locally bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, running each through its own pipeline.
    ///
    /// `make_pipeline` is called once per accepted connection so handler
    /// state is created fresh per session. A pipeline failure (codec or
    /// transport fatal) closes that connection only; the accept loop keeps
    /// running.
    pub async fn serve<F>(self, mut make_pipeline: F) -> Result<()>
    where
        F: FnMut() -> DispatchLoop,
    {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!(%peer, "engine connected");

            let pipeline = make_pipeline();
            tokio::spawn(async move {
                match pipeline.run(stream).await {
                    Ok(()) => info!(%peer, "session closed"),
                    Err(e) => error!(%peer, error = %e, "session failed"),
                }
            });
        }
    }

    /// Accept a single connection and run it to completion on the current
    /// task. Useful for tests and single-session deployments.
    pub async fn serve_one(self, pipeline: DispatchLoop) -> Result<()> {
        let (stream, peer) = self.listener.accept().await?;
        info!(%peer, "engine connected");
        pipeline.run(stream).await
    }
}
