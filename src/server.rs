//! HTTP server wiring for [`MetalinkService`]

use crate::service::MetalinkService;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Accept loop serving one [`MetalinkService`] over HTTP/1
pub struct MetalinkServer {
    service: Arc<MetalinkService>,
    listener: TcpListener,
}

impl MetalinkServer {
    /// Bind the server to `addr`
    pub async fn bind(service: Arc<MetalinkService>, addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_listener(service, listener))
    }

    /// Serve on an already bound listener
    pub fn from_listener(service: Arc<MetalinkService>, listener: TcpListener) -> Self {
        MetalinkServer { service, listener }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listener fails
    ///
    /// Each connection runs on its own task; dropping the returned future
    /// stops accepting new connections.
    pub async fn run(self) -> std::io::Result<()> {
        info!("Metalink server listening on http://{}", self.listener.local_addr()?);

        loop {
            let (stream, peer_addr) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let service = Arc::clone(&self.service);

            tokio::spawn(async move {
                let handler = service_fn(move |req| {
                    let service = Arc::clone(&service);
                    async move { Ok::<_, Infallible>(service.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, handler).await {
                    error!("Connection error from {}: {}", peer_addr, err);
                }
            });
        }
    }
}
