//! Public reachability for the local listener
//!
//! A tunnel maps a local port to a public base URL. The delivery server
//! only needs the URL and a way to stop the tunnel again.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

/// Default time allowed for a tunnel to come up
pub const DEFAULT_TUNNEL_STARTUP_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Failed to launch tunnel: {0}")]
    Spawn(std::io::Error),

    #[error("Tunnel did not come up within {0:?}")]
    Timeout(Duration),

    #[error("Tunnel exited before reporting a public URL")]
    Exited,

    #[error("Invalid tunnel URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TunnelResult<T> = Result<T, TunnelError>;

/// A running tunnel. Stops on drop.
pub struct TunnelHandle {
    public_url: Url,
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl TunnelHandle {
    pub fn new(public_url: Url, stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            public_url,
            stop: Some(Box::new(stop)),
        }
    }

    /// Handle for a URL that needs no teardown
    pub fn direct(public_url: Url) -> Self {
        Self {
            public_url,
            stop: None,
        }
    }

    pub fn public_url(&self) -> &Url {
        &self.public_url
    }

    /// Detach from the tunnel
    pub fn stop(mut self) {
        self.stop_now();
    }

    fn stop_now(&mut self) {
        if let Some(stop) = self.stop.take() {
            debug!("Stopping tunnel for {}", self.public_url);
            stop();
        }
    }
}

impl Drop for TunnelHandle {
    fn drop(&mut self) {
        self.stop_now();
    }
}

impl std::fmt::Debug for TunnelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelHandle")
            .field("public_url", &self.public_url.as_str())
            .field("running", &self.stop.is_some())
            .finish()
    }
}

/// Makes a local port reachable from the receiver's side
pub trait PublicTunnel {
    fn open(&self, port: u16) -> impl Future<Output = TunnelResult<TunnelHandle>> + Send;
}

/// No tunnel: the listener is advertised as `http://{host}:{port}`.
///
/// Useful on a LAN, behind an existing reverse proxy, and in tests.
#[derive(Debug, Clone)]
pub struct DirectTunnel {
    pub host: String,
}

impl Default for DirectTunnel {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
        }
    }
}

impl PublicTunnel for DirectTunnel {
    fn open(&self, port: u16) -> impl Future<Output = TunnelResult<TunnelHandle>> + Send {
        let url = format!("http://{}:{}", self.host, port);
        async move {
            let url = Url::parse(&url).map_err(|e| TunnelError::InvalidUrl(e.to_string()))?;
            Ok(TunnelHandle::direct(url))
        }
    }
}

/// Quick tunnel through a local `cloudflared` binary
#[derive(Debug, Clone)]
pub struct CloudflaredTunnel {
    pub binary: String,
    pub startup_timeout: Duration,
}

impl Default for CloudflaredTunnel {
    fn default() -> Self {
        Self {
            binary: "cloudflared".to_string(),
            startup_timeout: Duration::from_secs(DEFAULT_TUNNEL_STARTUP_SECS),
        }
    }
}

impl PublicTunnel for CloudflaredTunnel {
    fn open(&self, port: u16) -> impl Future<Output = TunnelResult<TunnelHandle>> + Send {
        let binary = self.binary.clone();
        let startup_timeout = self.startup_timeout;

        async move {
            let mut child = Command::new(&binary)
                .args(["tunnel", "--no-autoupdate", "--url"])
                .arg(format!("http://localhost:{}", port))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(TunnelError::Spawn)?;

            // cloudflared reports the assigned URL on stderr
            let stderr = child.stderr.take().ok_or(TunnelError::Exited)?;
            let mut lines = BufReader::new(stderr).lines();

            let scan = async {
                while let Some(line) = lines.next_line().await? {
                    debug!(target: "cloudflared", "{}", line);
                    if let Some(url) = extract_public_url(&line) {
                        return Ok(Some(url));
                    }
                }
                Ok::<_, std::io::Error>(None)
            };
            let public_url = tokio::time::timeout(startup_timeout, scan)
                .await
                .map_err(|_| TunnelError::Timeout(startup_timeout))??
                .ok_or(TunnelError::Exited)?;

            info!("Tunnel ready at {}", public_url);

            // keep draining so cloudflared never blocks on a full pipe
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "cloudflared", "{}", line);
                }
            });

            Ok(TunnelHandle::new(public_url, move || {
                let mut child = child;
                let _ = child.start_kill();
            }))
        }
    }
}

/// Pick the `https://*.trycloudflare.com` URL out of a cloudflared log line
fn extract_public_url(line: &str) -> Option<Url> {
    let start = line.find("https://")?;
    let candidate = line[start..]
        .split(|c: char| c.is_whitespace() || c == '|')
        .next()?;
    let url = Url::parse(candidate).ok()?;
    let host = url.host_str()?;
    host.ends_with(".trycloudflare.com").then_some(url)
}
