//! Share Session - in-memory lifecycle of one shared secret
//!
//! A [`ShareSession`] hands out its envelope a bounded number of times, an
//! [`ExpiryTimer`] destroys it when its deadline passes, and the
//! [`SessionRegistry`] maps public ids to sessions for the delivery server.

mod error;
mod event;
mod registry;
mod session;
mod timer;

pub use error::*;
pub use event::*;
pub use registry::*;
pub use session::*;
pub use timer::*;

/// Default view budget when the sender does not pick one
pub const DEFAULT_MAX_VIEWS: u32 = 1;

/// How long a retired id keeps answering `Gone` before it is forgotten
pub const TOMBSTONE_TTL: std::time::Duration = std::time::Duration::from_secs(3600);
