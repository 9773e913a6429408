//! Wall-clock auto-destruct for a share

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::ShareSession;

/// Single-shot countdown that expires a session.
///
/// Firing after the session already reached a terminal state does nothing,
/// since `expire` only moves a session out of `Active`.
pub struct ExpiryTimer {
    task: Mutex<Option<JoinHandle<()>>>,
    deadline: Option<Instant>,
}

impl ExpiryTimer {
    /// Start counting down. A zero duration means no expiry.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(session: &Arc<ShareSession>, duration: Duration) -> Self {
        if duration.is_zero() {
            return Self::disarmed();
        }

        let deadline = Instant::now() + duration;
        let weak: Weak<ShareSession> = Arc::downgrade(session);
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            let Some(session) = weak.upgrade() else {
                return;
            };
            if session.expire() {
                info!(share_id = %session.id(), "Share auto-destructed after {:?}", duration);
            }
        });

        debug!(share_id = %session.id(), "Expiry armed for {:?}", duration);
        Self {
            task: Mutex::new(Some(task)),
            deadline: Some(deadline),
        }
    }

    /// A timer that never fires
    pub fn disarmed() -> Self {
        Self {
            task: Mutex::new(None),
            deadline: None,
        }
    }

    /// Stop the countdown. Returns true if a pending countdown was stopped.
    pub fn disarm(&self) -> bool {
        match self.task.lock().take() {
            Some(task) => {
                let pending = !task.is_finished();
                task.abort();
                pending
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Time left on the countdown, `None` if the timer never fires
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl std::fmt::Debug for ExpiryTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryTimer")
            .field("armed", &self.is_armed())
            .field("remaining", &self.remaining())
            .finish()
    }
}
