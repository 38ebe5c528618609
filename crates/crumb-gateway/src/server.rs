use std::net::SocketAddr;

use tokio::sync::{mpsc, oneshot, watch};

use crate::error::GatewayError;
use crate::router::build_router;

/// A question submitted through the form. The receiver answers on `reply`.
#[derive(Debug)]
pub struct AskRequest {
    pub question: String,
    pub reply: oneshot::Sender<String>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub ask_tx: mpsc::Sender<AskRequest>,
}

pub struct GatewayServer {
    addr: SocketAddr,
    max_body_size: usize,
    ask_tx: mpsc::Sender<AskRequest>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        ask_tx: mpsc::Sender<AskRequest>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("form is reachable from any interface, there is no authentication");
        }

        Self {
            addr,
            max_body_size: 65_536,
            ask_tx,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve the form until the shutdown signal flips to `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let state = AppState {
            ask_tx: self.ask_tx,
        };
        let router = build_router(state, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("form listening on http://{}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                tracing::info!("gateway shutting down");
            })
            .await
            .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_builder_chain() {
        let (tx, _rx) = mpsc::channel(1);
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 7860, tx, srx).with_max_body_size(512);

        assert_eq!(server.max_body_size, 512);
        assert_eq!(server.addr().to_string(), "127.0.0.1:7860");
    }

    #[test]
    fn server_invalid_bind_fallback() {
        let (tx, _rx) = mpsc::channel(1);
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("not_an_ip", 9999, tx, srx);
        assert_eq!(server.addr.port(), 9999);
        assert!(server.addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let (tx, _rx) = mpsc::channel(1);
        let (stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 0, tx, srx);
        let handle = tokio::spawn(server.serve());
        stx.send(true).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
