//! Bridge service - wires the framed channel, the Correlator and the
//! HTTP gateway together and decides the process exit status.

use crate::diagnostics::ErrorLog;
use crate::domain::config::{BridgeConfig, ConfigError};
use crate::domain::error::{BridgeError, BridgeResult};
use crate::domain::pending::PendingRequestTable;
use crate::ipc::dispatch::DispatchLoop;
use crate::ipc::framing::FrameReader;
use crate::ipc::handler::{Correlator, FrameSender};
use crate::router::{build_router, AppState};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Exit status after the browser closed the stream.
pub const EXIT_OK: i32 = 0;
/// Exit status after a fatal transport error.
pub const EXIT_FAILURE: i32 = 1;

/// Bridge service state
pub struct BridgeService {
    config: BridgeConfig,
    pending: Arc<PendingRequestTable>,
    sender: Arc<dyn FrameSender>,
    correlator: Arc<Correlator>,
    error_log: ErrorLog,
}

/// Running HTTP listener.
pub struct HttpServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl HttpServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and let in-flight requests finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.handle.await {
            Ok(Err(e)) => error!(error = %e, "HTTP server error"),
            Err(e) if e.is_panic() => error!(error = %e, "HTTP server panicked"),
            _ => {}
        }
    }
}

impl BridgeService {
    /// Create the service. `sender` is the outbound half of the framed channel.
    pub fn new(config: BridgeConfig, sender: Arc<dyn FrameSender>) -> Result<Self, ConfigError> {
        config.validate()?;

        let pending = Arc::new(PendingRequestTable::new());
        let correlator = Arc::new(Correlator::new(Arc::clone(&pending), Arc::clone(&sender)));
        let error_log = ErrorLog::new(config.diagnostics.error_log.clone());

        Ok(Self {
            config,
            pending,
            sender,
            correlator,
            error_log,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn correlator(&self) -> Arc<Correlator> {
        Arc::clone(&self.correlator)
    }

    pub fn pending(&self) -> Arc<PendingRequestTable> {
        Arc::clone(&self.pending)
    }

    /// HTTP gateway over this service's Correlator.
    pub fn router(&self) -> Router {
        let state = AppState::new(self.correlator(), self.config.timeouts.clone());
        build_router(state, &self.config)
    }

    /// Bind the HTTP listener and serve in the background.
    ///
    /// A bind failure is logged and yields `None`; the framed protocol keeps
    /// running without an HTTP surface.
    pub async fn start_http(&self) -> Option<HttpServer> {
        let addr = self.config.http_addr();
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(addr = %addr, error = %e, "HTTP server failed to bind");
                return None;
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(local_addr) => local_addr,
            Err(e) => {
                error!(error = %e, "HTTP listener has no local address");
                return None;
            }
        };

        info!(port = local_addr.port(), addr = %local_addr, "Native host started");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = self.router();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Some(HttpServer {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            handle,
        })
    }

    /// Read the inbound stream until it ends or the transport fails.
    ///
    /// `Ok(())` means the browser closed the stream. Fatal errors are
    /// appended to the error log before they are returned.
    pub async fn run<R>(&self, inbound: R) -> BridgeResult<()>
    where
        R: AsyncRead + Unpin,
    {
        let reader = FrameReader::new(inbound, self.config.framing.max_frame_bytes);
        let dispatch = DispatchLoop::new(
            reader,
            Arc::clone(&self.pending),
            Arc::clone(&self.sender),
            self.config.framing.reply_fields.clone(),
        );
        let mut failures = self.correlator.transport_failures();

        let result = tokio::select! {
            result = dispatch.run() => result,
            reason = transport_failure(&mut failures) => Err(BridgeError::TransportClosed(reason)),
        };

        if let Err(e) = &result {
            error!(error = %e, "Bridge stopped on fatal error");
            self.error_log.record(&e.to_string());
        }
        result
    }

    /// Map the outcome of `run` to a process exit status.
    pub fn exit_code(result: &BridgeResult<()>) -> i32 {
        match result {
            Ok(()) => EXIT_OK,
            Err(_) => EXIT_FAILURE,
        }
    }
}

/// Resolve once the Correlator reports a failed outbound write.
async fn transport_failure(rx: &mut watch::Receiver<Option<String>>) -> String {
    loop {
        let current = rx.borrow_and_update().clone();
        if let Some(reason) = current {
            return reason;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}
