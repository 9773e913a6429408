//! Sender-side orchestration of a single share

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crypto_envelope::{encrypt, generate_key};
use parking_lot::Mutex;
use secret_protocol::{ShareLink, ShareState, ViewRecord, ViewSnapshot};
use share_session::{SessionRegistry, ShareEvent, ShareOptions, ShareSession};
use tokio::sync::mpsc;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::tunnel::{PublicTunnel, TunnelHandle};
use crate::{DeliveryServer, HostConfig, HostError, HostResult};

/// What the sender wants to share
pub struct SharePayload {
    pub data: Zeroizing<Vec<u8>>,
    /// Set for file shares, `None` for text
    pub filename: Option<String>,
}

impl SharePayload {
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Zeroizing::new(data.into()),
            filename: None,
        }
    }

    pub fn file(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Zeroizing::new(data.into()),
            filename: Some(filename.into()),
        }
    }
}

/// A share being served: session, listener and tunnel.
///
/// Teardown runs exactly once, from whichever path gets there first:
/// exhaustion, expiry, cancellation, an explicit `shutdown`, or drop.
pub struct ShareHost {
    link: ShareLink,
    session: Arc<ShareSession>,
    registry: Arc<SessionRegistry>,
    server: DeliveryServer,
    tunnel: Mutex<Option<TunnelHandle>>,
    events: mpsc::UnboundedReceiver<ShareEvent>,
    grace: Duration,
    torn_down: AtomicBool,
    final_view_seen: bool,
    finished: bool,
}

impl ShareHost {
    /// Encrypt the payload, start serving it and open the tunnel
    pub async fn start<T: PublicTunnel>(
        config: &HostConfig,
        payload: SharePayload,
        tunnel: &T,
    ) -> HostResult<Self> {
        if payload.data.is_empty() {
            return Err(HostError::EmptyPayload);
        }
        if payload.data.len() > config.max_payload_size {
            return Err(HostError::PayloadTooLarge {
                size: payload.data.len(),
                max: config.max_payload_size,
            });
        }

        let key = generate_key();
        let envelope = encrypt(&payload.data, &key)?;
        drop(payload.data);
        debug!("Sealed {} byte envelope", envelope.len());

        let registry = Arc::new(SessionRegistry::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let server = DeliveryServer::bind(config, registry.clone(), events_tx).await?;

        // the countdown starts once the share is reachable
        let tunnel = tunnel.open(server.local_addr().port()).await?;

        let session = registry.register(ShareSession::create(
            envelope,
            ShareOptions {
                filename: payload.filename,
                max_views: config.max_views,
                expires_in: config.expires_in,
            },
        )?);
        let link = ShareLink::build(tunnel.public_url(), session.id(), key)?;

        info!(
            share_id = %session.id(),
            public = %tunnel.public_url(),
            "Share published"
        );

        Ok(Self {
            link,
            session,
            registry,
            server,
            tunnel: Mutex::new(Some(tunnel)),
            events: events_rx,
            grace: config.shutdown_grace,
            torn_down: AtomicBool::new(false),
            final_view_seen: false,
            finished: false,
        })
    }

    /// Link to hand to the receiver
    pub fn link(&self) -> &ShareLink {
        &self.link
    }

    pub fn session(&self) -> &Arc<ShareSession> {
        &self.session
    }

    pub fn server(&self) -> &DeliveryServer {
        &self.server
    }

    /// Abort the share. Returns false if it had already ended.
    pub fn cancel(&self) -> bool {
        self.session.cancel()
    }

    /// Next notification.
    ///
    /// Yields `Viewed` for each delivered view, then exactly one `Finished`
    /// after teardown, then `None`. Safe to use inside `select!`.
    pub async fn next_event(&mut self) -> Option<ShareEvent> {
        if self.finished {
            return None;
        }

        if !self.session.state().is_terminal() {
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => return Some(self.observe(event)),
                _ = self.session.wait_terminal() => {}
            }
        }

        // the final view's notice arrives once its response has been sent
        let state = self.session.state();
        if state == ShareState::Exhausted && !self.final_view_seen {
            if let Ok(Some(event)) = tokio::time::timeout(self.grace, self.events.recv()).await {
                return Some(self.observe(event));
            }
        } else if let Ok(event) = self.events.try_recv() {
            return Some(self.observe(event));
        }

        self.shutdown().await;
        self.finished = true;
        Some(ShareEvent::Finished {
            id: self.session.id().clone(),
            state,
        })
    }

    /// Serve until the share ends, reporting each view. Returns the final state.
    pub async fn run(&mut self, mut on_view: impl FnMut(&ViewSnapshot, &ViewRecord)) -> ShareState {
        while let Some(event) = self.next_event().await {
            match event {
                ShareEvent::Viewed {
                    snapshot, record, ..
                } => on_view(&snapshot, &record),
                ShareEvent::Finished { state, .. } => return state,
            }
        }
        self.session.state()
    }

    /// Tear everything down and wait for in-flight responses. Idempotent.
    pub async fn shutdown(&self) {
        if self.teardown() {
            self.server.shutdown(self.grace).await;
        }
    }

    /// Synchronous part of teardown; true only for the first caller
    fn teardown(&self) -> bool {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return false;
        }

        self.registry.retire(self.session.id());
        self.server.stop();
        if let Some(tunnel) = self.tunnel.lock().take() {
            tunnel.stop();
        }

        info!(
            share_id = %self.session.id(),
            state = %self.session.state(),
            views = self.session.views_consumed(),
            "Share torn down"
        );
        true
    }

    fn observe(&mut self, event: ShareEvent) -> ShareEvent {
        if let ShareEvent::Viewed { snapshot, .. } = &event {
            if snapshot.done {
                self.final_view_seen = true;
            }
        }
        event
    }
}

impl Drop for ShareHost {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::DirectTunnel;

    #[tokio::test]
    async fn test_empty_payload_rejected() {
        let result = ShareHost::start(
            &HostConfig::default(),
            SharePayload::text(Vec::new()),
            &DirectTunnel::default(),
        )
        .await;
        assert!(matches!(result, Err(HostError::EmptyPayload)));
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected_before_encryption() {
        let config = HostConfig {
            max_payload_size: 8,
            ..Default::default()
        };
        let result = ShareHost::start(
            &config,
            SharePayload::text(vec![0u8; 9]),
            &DirectTunnel::default(),
        )
        .await;
        assert!(matches!(
            result,
            Err(HostError::PayloadTooLarge { size: 9, max: 8 })
        ));
    }

    #[tokio::test]
    async fn test_cancel_tears_down_once() {
        let mut host = ShareHost::start(
            &HostConfig::default(),
            SharePayload::text("cancel me"),
            &DirectTunnel::default(),
        )
        .await
        .unwrap();

        assert!(host.link().shareable_url().contains("#key="));
        assert!(host.cancel());
        assert!(!host.cancel());

        match host.next_event().await {
            Some(ShareEvent::Finished { state, .. }) => assert_eq!(state, ShareState::Cancelled),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(host.next_event().await.is_none());
        assert!(!host.session().holds_envelope());
        assert_eq!(host.server().registry().active_count(), 0);

        assert!(!host.teardown());
        host.shutdown().await;
    }
}
