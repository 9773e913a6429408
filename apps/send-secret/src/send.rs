//! Sending side: read the secret, publish it, report views

use std::io::IsTerminal;
use std::path::Path;

use anyhow::{Context, Result, bail};
use delivery_server::tunnel::{CloudflaredTunnel, DirectTunnel, PublicTunnel};
use delivery_server::{HostConfig, ShareHost, SharePayload};
use secret_protocol::{MAX_PAYLOAD_SIZE, ShareState, ViewRecord, ViewSnapshot};
use share_session::ShareEvent;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::cli::{SendArgs, TunnelKind};
use crate::format::{format_bytes, format_duration};

pub async fn run(args: SendArgs) -> Result<()> {
    let payload = read_payload(args.file.as_deref()).await?;
    let config = args.host_config();

    match args.tunnel {
        TunnelKind::Direct => {
            let tunnel = DirectTunnel {
                host: args.advertised_host(),
            };
            serve(&config, payload, &tunnel).await
        }
        TunnelKind::Cloudflared => serve(&config, payload, &CloudflaredTunnel::default()).await,
    }
}

async fn serve<T: PublicTunnel>(config: &HostConfig, payload: SharePayload, tunnel: &T) -> Result<()> {
    eprintln!("Starting tunnel...");
    let mut host = ShareHost::start(config, payload, tunnel)
        .await
        .context("Failed to publish secret")?;

    eprintln!("\nShare this link:");
    println!("{}", host.link().shareable_url());
    match config.expires_in {
        Some(expires_in) => eprintln!("Expires in {}\n", format_duration(expires_in)),
        None => eprintln!("Keep this terminal open until received\n"),
    }
    eprintln!("Waiting for receiver...");

    let state = loop {
        tokio::select! {
            event = host.next_event() => match event {
                Some(ShareEvent::Viewed { snapshot, record, .. }) => {
                    report_view(&host, &snapshot, &record);
                }
                Some(ShareEvent::Finished { state, .. }) => break state,
                None => break host.session().state(),
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                debug!("Interrupted");
                host.cancel();
            }
        }
    };

    report_outcome(&host, state, config);
    info!(share_id = %host.session().id(), %state, "Share finished");
    Ok(())
}

fn report_view(host: &ShareHost, snapshot: &ViewSnapshot, record: &ViewRecord) {
    let source = record.source.as_deref().unwrap_or("unknown address");
    let mut line = format!("Viewed ({}/{}) from {}", snapshot.current, snapshot.max, source);
    if !snapshot.done {
        if let Some(remaining) = host.session().remaining_time() {
            line.push_str(&format!(", expires in {}", format_duration(remaining)));
        }
    }
    eprintln!("{}", line);
}

fn report_outcome(host: &ShareHost, state: ShareState, config: &HostConfig) {
    let views = host.session().views_consumed();
    match state {
        ShareState::Exhausted => eprintln!("\nSecret delivered and deleted"),
        ShareState::Expired => {
            let after = config.expires_in.map(format_duration).unwrap_or_default();
            eprintln!("\nSecret auto-destructed after {} ({} of {} views used)", after, views, config.max_views);
        }
        ShareState::Cancelled if views == 0 => eprintln!("\nCancelled. Secret was never delivered."),
        ShareState::Cancelled => eprintln!("\nCancelled after {} of {} views", views, config.max_views),
        ShareState::Active => eprintln!("\nStopped"),
    }
}

async fn read_payload(file: Option<&Path>) -> Result<SharePayload> {
    if let Some(path) = file {
        let size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot read {}", path.display()))?
            .len();
        if size > MAX_PAYLOAD_SIZE as u64 {
            bail!("File too large (max {})", format_bytes(MAX_PAYLOAD_SIZE as u64));
        }

        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("Path has no file name")?;
        eprintln!("Encrypting {} ({})", filename, format_bytes(size));
        return Ok(SharePayload::file(filename, data));
    }

    let data = if std::io::stdin().is_terminal() {
        eprintln!("Enter secret, press Enter, then Ctrl-D:");
        read_interactive().await?
    } else {
        let mut data = Vec::new();
        tokio::io::stdin()
            .take(MAX_PAYLOAD_SIZE as u64 + 1)
            .read_to_end(&mut data)
            .await
            .context("Failed to read stdin")?;
        data
    };

    if data.is_empty() {
        bail!("No data to send");
    }
    eprintln!("Encrypting input ({})", format_bytes(data.len() as u64));
    Ok(SharePayload::text(data))
}

/// Lines until EOF, joined without the final newline
async fn read_interactive() -> Result<Vec<u8>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut text = String::new();
    while let Some(mut line) = lines.next_line().await.context("Failed to read input")? {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&line);
        line.zeroize();
    }
    Ok(text.into_bytes())
}
