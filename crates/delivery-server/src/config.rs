//! Sender-side configuration

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use secret_protocol::MAX_PAYLOAD_SIZE;
use share_session::DEFAULT_MAX_VIEWS;

use crate::DEFAULT_SHUTDOWN_GRACE_SECS;

/// Delivery host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Address the local listener binds to
    pub bind_addr: IpAddr,
    /// Listener port (0 picks a free one)
    pub port: u16,
    /// Successful retrievals before the share is destroyed
    pub max_views: u32,
    /// Auto-destruct delay (None = wait until retrieved or cancelled)
    pub expires_in: Option<Duration>,
    /// Largest accepted plaintext in bytes
    pub max_payload_size: usize,
    /// Headers trusted to carry the receiver address, first match wins
    pub forwarded_headers: Vec<String>,
    /// How long teardown waits for in-flight responses
    pub shutdown_grace: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            max_views: DEFAULT_MAX_VIEWS,
            expires_in: None,
            max_payload_size: MAX_PAYLOAD_SIZE,
            forwarded_headers: vec!["cf-connecting-ip".to_string(), "x-forwarded-for".to_string()],
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}
