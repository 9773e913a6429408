//! Fetch and decrypt a share

use std::path::PathBuf;
use std::time::Duration;

use crypto_envelope::decrypt;
use reqwest::StatusCode;
use secret_protocol::{ShareLink, ShareMeta};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::{DEFAULT_REQUEST_TIMEOUT_SECS, ReceiveError, ReceiveResult, sanitize_filename};

/// Receiver configuration
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Upper bound for each HTTP request
    pub request_timeout: Duration,
    /// Where file shares land when no output path is given
    /// (`~/.send-secret/received` when unset)
    pub received_dir: Option<PathBuf>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            received_dir: None,
        }
    }
}

/// A decrypted share
pub struct ReceivedSecret {
    /// Sanitized original file name, `None` for text shares
    pub filename: Option<String>,
    pub plaintext: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for ReceivedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceivedSecret")
            .field("filename", &self.filename)
            .field("len", &self.plaintext.len())
            .finish()
    }
}

/// HTTP client for the receiving side.
///
/// Only ever requests fragment-free URLs, so the key stays local.
pub struct Receiver {
    client: reqwest::Client,
    config: ReceiverConfig,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> ReceiveResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("send-secret/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ReceiveError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Split a full link into its location and key, before any network call
    pub fn parse(url: &str) -> ReceiveResult<ShareLink> {
        Ok(ShareLink::parse(url)?)
    }

    /// Best-effort filename lookup; any failure means "no filename"
    pub async fn fetch_meta(&self, link: &ShareLink) -> Option<String> {
        let response = match self.client.get(link.meta_url()).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!("Metadata unavailable: {}", response.status());
                return None;
            }
            Err(e) => {
                warn!("Metadata request failed: {}", e);
                return None;
            }
        };

        match response.json::<ShareMeta>().await {
            Ok(meta) => meta.filename.as_deref().and_then(sanitize_filename),
            Err(e) => {
                warn!("Unreadable metadata: {}", e);
                None
            }
        }
    }

    /// Fetch the sealed envelope, consuming one view on the sender side
    pub async fn fetch_blob(&self, link: &ShareLink) -> ReceiveResult<Vec<u8>> {
        let response = self
            .client
            .get(link.blob_url())
            .send()
            .await
            .map_err(|e| ReceiveError::FetchFailed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::GONE {
            return Err(ReceiveError::AlreadyRetrieved);
        }
        if !status.is_success() {
            return Err(ReceiveError::FetchFailed(status.to_string()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ReceiveError::FetchFailed(e.to_string()))?;
        debug!("Fetched {} byte envelope", body.len());
        Ok(body.to_vec())
    }

    /// Decrypt locally with the fragment key
    pub fn decrypt(envelope: &[u8], link: &ShareLink) -> ReceiveResult<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(decrypt(envelope, link.key())?))
    }

    /// Parse, fetch metadata, fetch the envelope and decrypt it
    pub async fn receive(&self, url: &str) -> ReceiveResult<ReceivedSecret> {
        let link = Self::parse(url)?;
        let filename = self.fetch_meta(&link).await;
        let envelope = self.fetch_blob(&link).await?;
        let plaintext = Self::decrypt(&envelope, &link)?;

        info!(
            "Secret retrieved ({} bytes, {})",
            plaintext.len(),
            if filename.is_some() { "file" } else { "text" }
        );
        Ok(ReceivedSecret {
            filename,
            plaintext,
        })
    }
}
