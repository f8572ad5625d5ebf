//! Dnsmasq command implementation.

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::cli::DnsmasqArgs;
use crate::config::Config;
use crate::dnsmasq::{install_fragment, RenderOptions};
use crate::fetcher::create_transport;
use crate::signal::{ShutdownGuard, ShutdownToken};

/// Run the dnsmasq command
pub async fn run(args: DnsmasqArgs, mut config: Config) -> Result<()> {
    apply_args(&mut config, &args)?;
    config.validate_dnsmasq()?;

    let transport = create_transport(config.transport)?;
    let shutdown = ShutdownToken::new();
    let _guard = ShutdownGuard::new(shutdown.clone());

    let opts = RenderOptions::from_config(&config.dnsmasq);
    let dir = &config.dnsmasq.target_dir;
    info!("Installing {} fragment(s) into {:?}", config.dnsmasq.urls.len(), dir);

    let mut failed = 0;
    println!();
    for url in &config.dnsmasq.urls {
        match install_fragment(
            transport.as_ref(),
            url,
            dir,
            &opts,
            config.work_dir.as_ref(),
            &shutdown,
        )
        .await
        {
            Ok(report) => println!(
                "[OK] {} ({} lines)",
                report.path.display(),
                report.stats.lines
            ),
            Err(e) => {
                failed += 1;
                error!("{:#}", e);
                println!("[FAILED] {}: {:#}", url, e);
            }
        }
        if shutdown.is_cancelled() {
            break;
        }
    }

    if failed > 0 {
        anyhow::bail!(
            "{} of {} dnsmasq fragment(s) failed to install",
            failed,
            config.dnsmasq.urls.len()
        );
    }
    Ok(())
}

/// Layer command-line flags over the loaded configuration.
pub fn apply_args(config: &mut Config, args: &DnsmasqArgs) -> Result<()> {
    if !args.urls.is_empty() {
        config.dnsmasq.urls = args.urls.clone();
    }
    if let Some(dir) = &args.dir {
        config.dnsmasq.target_dir = dir.clone();
    }
    if let Some(dns4) = &args.dns4 {
        config.dnsmasq.ipv4 = dns4.clone();
    }
    if let Some(dns6) = &args.dns6 {
        config.dnsmasq.ipv6 = Some(dns6.clone());
    }
    if args.ipv6 {
        config.dnsmasq.ipv6_enabled = true;
    }
    if let Some(kind) = &args.transport {
        config.transport = kind
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("Invalid --transport")?;
    }
    Ok(())
}
