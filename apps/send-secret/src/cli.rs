//! Command line interface

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use delivery_server::HostConfig;
use share_session::DEFAULT_MAX_VIEWS;

#[derive(Debug, Parser)]
#[command(
    name = "send-secret",
    version,
    about = "Share a secret through a self-destructing, end-to-end encrypted link",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub send: SendArgs,

    /// Receive a secret from URL
    #[arg(short = 'r', long = "receive", value_name = "URL", conflicts_with = "file")]
    pub receive: Option<String>,

    /// Where to save a received secret
    #[arg(short, long, value_name = "PATH", requires = "receive")]
    pub output: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Receive a secret and decrypt it locally
    Receive(ReceiveArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ReceiveArgs {
    /// Full link including the #key=... fragment
    pub url: String,

    /// File or directory to save to (text is printed otherwise)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct SendArgs {
    /// File to send; reads piped stdin or prompts when omitted
    pub file: Option<PathBuf>,

    /// Views allowed before the secret is destroyed
    #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_VIEWS, value_parser = clap::value_parser!(u32).range(1..))]
    pub views: u32,

    /// Auto-destruct after this many seconds
    #[arg(short, long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// How the receiver reaches this machine
    #[arg(long, value_enum, default_value_t = TunnelKind::Cloudflared)]
    pub tunnel: TunnelKind,

    /// Local address to listen on
    #[arg(long, value_name = "ADDR", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// Local port (0 picks a free one)
    #[arg(long, default_value_t = 0)]
    pub port: u16,

    /// Host name advertised in the link with --tunnel direct
    #[arg(long, value_name = "HOST")]
    pub public_host: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TunnelKind {
    /// Quick tunnel through a local cloudflared binary
    Cloudflared,
    /// No tunnel, advertise the listener address as is
    Direct,
}

/// What the invocation asks for
#[derive(Debug)]
pub enum Mode {
    Send(SendArgs),
    Receive(ReceiveArgs),
}

impl Cli {
    pub fn into_mode(self) -> Mode {
        match (self.command, self.receive) {
            (Some(Command::Receive(args)), _) => Mode::Receive(args),
            (None, Some(url)) => Mode::Receive(ReceiveArgs {
                url,
                output: self.output,
            }),
            (None, None) => Mode::Send(self.send),
        }
    }
}

impl SendArgs {
    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            bind_addr: self.bind,
            port: self.port,
            max_views: self.views,
            expires_in: self.timeout.map(Duration::from_secs),
            ..Default::default()
        }
    }

    /// Host put into direct links
    pub fn advertised_host(&self) -> String {
        if let Some(host) = &self.public_host {
            return host.clone();
        }
        match self.bind {
            addr if addr.is_unspecified() => Ipv4Addr::LOCALHOST.to_string(),
            IpAddr::V6(addr) => format!("[{}]", addr),
            addr => addr.to_string(),
        }
    }
}
