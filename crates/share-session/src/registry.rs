//! Registry of shares served by this process

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use secret_protocol::{ShareId, ShareState};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{ExpiryTimer, SessionError, SessionResult, ShareSession, TOMBSTONE_TTL, ViewGrant};

/// Outcome of looking up a share id
#[derive(Debug, Clone)]
pub enum Lookup {
    Active(Arc<ShareSession>),
    /// The id existed but its share has been destroyed
    Retired(ShareState),
    Unknown,
}

impl Lookup {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

/// Session handle plus its expiry timer
struct RegisteredShare {
    session: Arc<ShareSession>,
    timer: ExpiryTimer,
}

/// What is left of a destroyed share
#[derive(Debug, Clone, Copy)]
struct Tombstone {
    state: ShareState,
    retired_at: Instant,
}

/// Active shares by id, plus tombstones for destroyed ones.
///
/// Tombstones only remember the terminal state, so a retired id keeps
/// answering `Gone` without any envelope bytes staying in memory. They are
/// swept once older than the tombstone TTL; after that the id is unknown.
pub struct SessionRegistry {
    active: DashMap<ShareId, RegisteredShare>,
    retired: DashMap<ShareId, Tombstone>,
    tombstone_ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_tombstone_ttl(TOMBSTONE_TTL)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tombstone_ttl(tombstone_ttl: Duration) -> Self {
        Self {
            active: DashMap::new(),
            retired: DashMap::new(),
            tombstone_ttl,
        }
    }

    /// Register a session and arm its expiry timer.
    ///
    /// Must be called from within a Tokio runtime when the session expires.
    pub fn register(&self, session: ShareSession) -> Arc<ShareSession> {
        let session = Arc::new(session);

        let timer = match session.remaining_time() {
            Some(remaining) if remaining.is_zero() => {
                session.expire();
                ExpiryTimer::disarmed()
            }
            Some(remaining) => ExpiryTimer::arm(&session, remaining),
            None => ExpiryTimer::disarmed(),
        };

        info!(
            share_id = %session.id(),
            max_views = session.max_views(),
            file = session.is_file(),
            "Share registered"
        );
        self.active.insert(
            session.id().clone(),
            RegisteredShare {
                session: session.clone(),
                timer,
            },
        );
        session
    }

    /// Find a share, retiring it on the spot if it already ended
    pub fn lookup(&self, id: &ShareId) -> Lookup {
        let session = self.active.get(id).map(|entry| entry.session.clone());
        if let Some(session) = session {
            let state = session.state();
            if state.is_terminal() {
                self.retire(id);
                return Lookup::Retired(state);
            }
            return Lookup::Active(session);
        }

        match self.retired.get(id) {
            Some(tombstone) => Lookup::Retired(tombstone.state),
            None => Lookup::Unknown,
        }
    }

    /// Consume one view of the share behind `id`
    pub fn consume_view(&self, id: &ShareId, source: Option<String>) -> SessionResult<ViewGrant> {
        let session = match self.lookup(id) {
            Lookup::Active(session) => session,
            Lookup::Retired(state) => return Err(SessionError::Gone(state)),
            Lookup::Unknown => return Err(SessionError::NotFound),
        };

        let result = session.consume_view(source);
        if session.state().is_terminal() {
            self.retire(id);
        }
        result
    }

    /// Destroy a share: cancel it if still active, disarm its timer and
    /// leave a tombstone.
    ///
    /// Only the caller that removes the entry performs the teardown and
    /// gets the final state back; every other call is a no-op.
    pub fn retire(&self, id: &ShareId) -> Option<ShareState> {
        let session = self.active.get(id).map(|entry| entry.session.clone())?;

        session.cancel();
        let state = session.state();
        self.retired.insert(
            id.clone(),
            Tombstone {
                state,
                retired_at: Instant::now(),
            },
        );

        let (_, entry) = self.active.remove(id)?;
        entry.timer.disarm();
        debug!(share_id = %id, %state, "Share retired");

        self.prune_retired();
        Some(state)
    }

    /// Forget tombstones older than the TTL. Returns how many were dropped.
    pub fn prune_retired(&self) -> usize {
        let before = self.retired.len();
        let ttl = self.tombstone_ttl;
        self.retired
            .retain(|_, tombstone| tombstone.retired_at.elapsed() < ttl);
        let pruned = before.saturating_sub(self.retired.len());
        if pruned > 0 {
            debug!("Pruned {} tombstones", pruned);
        }
        pruned
    }

    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Retire every active share, e.g. on process shutdown
    pub fn retire_all(&self) -> usize {
        let ids: Vec<ShareId> = self.active.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.retire(id).is_some()).count()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn contains(&self, id: &ShareId) -> bool {
        self.active.contains_key(id)
    }
}
