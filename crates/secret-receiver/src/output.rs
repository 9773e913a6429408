//! Where received plaintext ends up

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::{RECEIVED_SUBDIR, ReceiveError, ReceiveResult, ReceivedSecret};

/// Outcome of delivering a received secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    /// Written to this file
    Saved(PathBuf),
    /// Text share meant for direct display
    Inline(String),
}

/// `~/.send-secret/received`
pub fn default_received_dir() -> ReceiveResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(RECEIVED_SUBDIR))
        .ok_or_else(|| ReceiveError::NoOutputLocation("home directory unknown".to_string()))
}

/// Reduce a server-supplied name to its last path component
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return None;
    }
    Some(base.to_string())
}

/// `report.pdf` -> `report_2024-05-01T12-30-00.pdf`
pub fn timestamped_name(filename: &str, now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y-%m-%dT%H-%M-%S");
    match filename.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &filename[..dot], stamp, &filename[dot..]),
        _ => format!("{}_{}", filename, stamp),
    }
}

/// Decide where the plaintext goes and write it.
///
/// File shares go to `output` (a file, or a directory keeping the original
/// name) or to a timestamped file in `received_dir`, which defaults to
/// `~/.send-secret/received` and is only resolved when needed. Text shares
/// go to `output` if given, otherwise they are returned for display.
pub async fn deliver(
    secret: &ReceivedSecret,
    output: Option<&Path>,
    received_dir: Option<&Path>,
) -> ReceiveResult<Delivered> {
    let target = match (&secret.filename, output) {
        (Some(filename), None) => {
            let dir = match received_dir {
                Some(dir) => dir.to_path_buf(),
                None => default_received_dir()?,
            };
            fs::create_dir_all(&dir).await?;
            unique_path(&dir, &timestamped_name(filename, Utc::now())).await
        }
        (Some(filename), Some(output)) if is_directory_target(output).await => {
            fs::create_dir_all(output).await?;
            output.join(filename)
        }
        (_, Some(output)) => output.to_path_buf(),
        (None, None) => {
            let text = String::from_utf8_lossy(&secret.plaintext).into_owned();
            return Ok(Delivered::Inline(text));
        }
    };

    write_private(&target, &secret.plaintext).await?;
    info!("Saved received secret to {}", target.display());
    Ok(Delivered::Saved(target))
}

async fn is_directory_target(path: &Path) -> bool {
    let trailing_separator = path
        .to_str()
        .is_some_and(|s| s.ends_with('/') || s.ends_with(std::path::MAIN_SEPARATOR));
    trailing_separator || fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

/// First of `name`, `stem-1.ext`, `stem-2.ext`, ... that does not exist yet
async fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{}-{}{}", stem, n, ext));
        if !fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

async fn write_private(path: &Path, data: &[u8]) -> ReceiveResult<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}
