//! Listener lifecycle for the delivery routes

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use share_session::{SessionRegistry, ShareEvent};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{DeliveryState, HostConfig, HostError, HostResult, router};

/// Delivery routes bound to a local port.
///
/// Serves every share in its registry; stopping is idempotent and also
/// happens on drop.
pub struct DeliveryServer {
    local_addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryServer {
    /// Bind the listener and start serving
    pub async fn bind(
        config: &HostConfig,
        registry: Arc<SessionRegistry>,
        events: mpsc::UnboundedSender<ShareEvent>,
    ) -> HostResult<Self> {
        let addr = SocketAddr::new(config.bind_addr, config.port);
        let listener = TcpListener::bind(addr).await.map_err(HostError::Bind)?;
        let local_addr = listener.local_addr()?;

        let app = router(DeliveryState::new(
            registry.clone(),
            events,
            &config.forwarded_headers,
        ));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let served = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;

            if let Err(e) = served {
                error!("Delivery server failed: {}", e);
            }
        });

        info!("Delivery server listening on {}", local_addr);

        Ok(Self {
            local_addr,
            registry,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Stop accepting connections. Returns false if already stopping.
    pub fn stop(&self) -> bool {
        match self.shutdown_tx.lock().take() {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Stop and wait up to `grace` for in-flight responses
    pub async fn shutdown(&self, grace: Duration) {
        self.stop();

        let Some(mut task) = self.task.lock().take() else {
            return;
        };
        if tokio::time::timeout(grace, &mut task).await.is_err() {
            warn!("Delivery server did not drain within {:?}, aborting", grace);
            task.abort();
        }
        info!("Delivery server on {} stopped", self.local_addr);
    }
}

impl Drop for DeliveryServer {
    fn drop(&mut self) {
        self.stop();
    }
}
