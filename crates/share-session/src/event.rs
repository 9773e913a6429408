//! Notifications emitted while a share is being served

use secret_protocol::{ShareId, ShareState, ViewRecord, ViewSnapshot};

/// Share lifecycle notification for UI and CLI feedback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareEvent {
    /// A retrieval response was handed to the connection
    Viewed {
        id: ShareId,
        snapshot: ViewSnapshot,
        record: ViewRecord,
    },
    /// The share reached a terminal state and was torn down
    Finished { id: ShareId, state: ShareState },
}
