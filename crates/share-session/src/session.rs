//! Share session state machine

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use secret_protocol::{ShareId, ShareState, ViewRecord, ViewSnapshot};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{DEFAULT_MAX_VIEWS, SessionError, SessionResult};

/// How a share may be retrieved
#[derive(Debug, Clone)]
pub struct ShareOptions {
    /// Original file name, `None` for text shares
    pub filename: Option<String>,
    /// Number of successful retrievals before the share is destroyed
    pub max_views: u32,
    /// Auto-destruct delay; `None` or zero means no expiry
    pub expires_in: Option<Duration>,
}

impl Default for ShareOptions {
    fn default() -> Self {
        Self {
            filename: None,
            max_views: DEFAULT_MAX_VIEWS,
            expires_in: None,
        }
    }
}

/// Result of a successful retrieval
#[derive(Debug, Clone)]
pub struct ViewGrant {
    pub snapshot: ViewSnapshot,
    /// Envelope bytes; stays valid after the session drops its own copy
    pub envelope: Bytes,
    pub record: ViewRecord,
}

struct SessionInner {
    state: ShareState,
    views_consumed: u32,
    envelope: Option<Bytes>,
    view_log: Vec<ViewRecord>,
}

/// One shared secret held in memory
pub struct ShareSession {
    id: ShareId,
    filename: Option<String>,
    max_views: u32,
    deadline: Option<Instant>,
    inner: Mutex<SessionInner>,
    state_tx: watch::Sender<ShareState>,
}

impl ShareSession {
    /// Create an active session around a sealed envelope
    pub fn create(envelope: impl Into<Bytes>, options: ShareOptions) -> SessionResult<Self> {
        Self::with_id(ShareId::generate(), envelope, options)
    }

    /// Create a session under a caller-chosen id
    pub fn with_id(
        id: ShareId,
        envelope: impl Into<Bytes>,
        options: ShareOptions,
    ) -> SessionResult<Self> {
        if options.max_views == 0 {
            return Err(SessionError::InvalidMaxViews);
        }

        let deadline = options
            .expires_in
            .filter(|d| !d.is_zero())
            .map(|d| Instant::now() + d);
        let (state_tx, _) = watch::channel(ShareState::Active);

        Ok(Self {
            id,
            filename: options.filename,
            max_views: options.max_views,
            deadline,
            inner: Mutex::new(SessionInner {
                state: ShareState::Active,
                views_consumed: 0,
                envelope: Some(envelope.into()),
                view_log: Vec::new(),
            }),
            state_tx,
        })
    }

    pub fn id(&self) -> &ShareId {
        &self.id
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// File shares carry a name; text shares do not
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    pub fn max_views(&self) -> u32 {
        self.max_views
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before expiry, `None` if the share never expires
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn state(&self) -> ShareState {
        self.inner.lock().state
    }

    pub fn views_consumed(&self) -> u32 {
        self.inner.lock().views_consumed
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let inner = self.inner.lock();
        ViewSnapshot {
            current: inner.views_consumed,
            max: self.max_views,
            done: inner.state == ShareState::Exhausted,
        }
    }

    pub fn view_log(&self) -> Vec<ViewRecord> {
        self.inner.lock().view_log.clone()
    }

    /// Whether the envelope is still held in memory
    pub fn holds_envelope(&self) -> bool {
        self.inner.lock().envelope.is_some()
    }

    /// Consume one view.
    ///
    /// The whole check-and-increment runs under the session lock, so
    /// concurrent callers can never be granted more than `max_views` views.
    pub fn consume_view(&self, source: Option<String>) -> SessionResult<ViewGrant> {
        let mut inner = self.inner.lock();

        if inner.state == ShareState::Active
            && self.deadline.is_some_and(|d| Instant::now() >= d)
        {
            self.finish(&mut inner, ShareState::Expired);
        }

        if inner.state != ShareState::Active {
            debug!(share_id = %self.id, state = %inner.state, "Refused view");
            return Err(SessionError::Gone(inner.state));
        }

        let Some(envelope) = inner.envelope.clone() else {
            return Err(SessionError::Gone(inner.state));
        };

        inner.views_consumed += 1;
        let record = ViewRecord {
            ordinal: inner.views_consumed,
            source,
            timestamp: Utc::now(),
        };
        inner.view_log.push(record.clone());

        let done = inner.views_consumed >= self.max_views;
        if done {
            self.finish(&mut inner, ShareState::Exhausted);
        }

        Ok(ViewGrant {
            snapshot: ViewSnapshot {
                current: inner.views_consumed,
                max: self.max_views,
                done,
            },
            envelope,
            record,
        })
    }

    /// Abort the share. Returns false if it was already terminal.
    pub fn cancel(&self) -> bool {
        self.terminate(ShareState::Cancelled)
    }

    /// Mark the share as expired. Returns false if it was already terminal.
    pub fn expire(&self) -> bool {
        self.terminate(ShareState::Expired)
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<ShareState> {
        self.state_tx.subscribe()
    }

    /// Resolve once the session reaches a terminal state
    pub async fn wait_terminal(&self) -> ShareState {
        let mut rx = self.state_tx.subscribe();
        match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    fn terminate(&self, state: ShareState) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return false;
        }
        self.finish(&mut inner, state);
        true
    }

    /// Enter a terminal state and drop the envelope
    fn finish(&self, inner: &mut SessionInner, state: ShareState) {
        inner.state = state;
        inner.envelope = None;
        self.state_tx.send_replace(state);
        info!(share_id = %self.id, %state, views = inner.views_consumed, "Share closed");
    }
}

impl std::fmt::Debug for ShareSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareSession")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("max_views", &self.max_views)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
