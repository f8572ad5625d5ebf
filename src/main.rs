//! listsync - address list to IP set synchronizer
//!
//! Loads remote address lists into kernel IP sets and installs dnsmasq fragments.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use listsync::cli::{Cli, Commands};
use listsync::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Version = cli.command {
        println!("listsync {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let (config_path, explicit) = cli.config_path();
    let config = Config::load_layered(&config_path, explicit)?;

    match cli.command {
        Commands::Ipset(args) => listsync::commands::ipset::run(args, config).await,
        Commands::Dnsmasq(args) => listsync::commands::dnsmasq::run(args, config).await,
        Commands::Config => listsync::commands::config::run(&config),
        Commands::Version => Ok(()),
    }
}
