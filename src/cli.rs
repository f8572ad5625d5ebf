//! CLI argument parsing with clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "listsync")]
#[command(author, version, about = "Sync remote address lists into IP sets and install dnsmasq fragments")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (missing default file means built-in defaults)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Quiet mode (for cron)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Config path to load and whether it was given explicitly.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download address lists and load them into IP sets (full replace)
    Ipset(IpsetArgs),

    /// Download dnsmasq fragments and install them with your DNS servers
    Dnsmasq(DnsmasqArgs),

    /// Print the effective configuration as YAML
    Config,

    /// Show version
    Version,
}

#[derive(Args, Debug, Default, Clone)]
pub struct IpsetArgs {
    /// IPv4 set name
    #[arg(long)]
    pub v4_set: Option<String>,

    /// IPv6 set name
    #[arg(long)]
    pub v6_set: Option<String>,

    /// IPv4 list URL
    #[arg(long)]
    pub v4_url: Option<String>,

    /// IPv6 list URL
    #[arg(long)]
    pub v6_url: Option<String>,

    /// Do not touch the IPv4 set
    #[arg(long)]
    pub skip_v4: bool,

    /// Do not touch the IPv6 set
    #[arg(long)]
    pub skip_v6: bool,

    /// Download transport (builtin, curl, wget, auto)
    #[arg(long)]
    pub transport: Option<String>,

    /// Fetch and validate lists without modifying any set
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Default, Clone)]
pub struct DnsmasqArgs {
    /// Fragment URL (repeatable; replaces the configured list)
    #[arg(long = "url")]
    pub urls: Vec<String>,

    /// Directory to install fragments into
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// IPv4 DNS server written into fragments
    #[arg(long)]
    pub dns4: Option<String>,

    /// IPv6 DNS server written into fragments
    #[arg(long)]
    pub dns6: Option<String>,

    /// Also emit IPv6 server lines
    #[arg(long)]
    pub ipv6: bool,

    /// Download transport (builtin, curl, wget, auto)
    #[arg(long)]
    pub transport: Option<String>,
}
