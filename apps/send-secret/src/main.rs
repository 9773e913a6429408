//! send-secret - one-time, end-to-end encrypted secret sharing
//!
//! The secret is encrypted locally, served from this machine through a
//! tunnel, and destroyed after it has been viewed or has expired.

mod cli;
mod format;
mod receive;
mod send;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout is reserved for the link or the received secret
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let mut filter = EnvFilter::from_default_env();
    for target in [
        "send_secret",
        "delivery_server",
        "secret_receiver",
        "share_session",
    ] {
        filter = filter.add_directive(format!("{}={}", target, level).parse()?);
    }
    if cli.verbose > 1 {
        filter = filter.add_directive("tower_http=debug".parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.into_mode() {
        Mode::Send(args) => send::run(args).await,
        Mode::Receive(args) => receive::run(&args.url, args.output.as_deref()).await,
    }
}
