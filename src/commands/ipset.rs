//! Ipset command implementation.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::cli::IpsetArgs;
use crate::config::Config;
use crate::error::SyncError;
use crate::fetcher::create_transport;
use crate::ipset::{check_root, AddressFamily, IpsetCommand};
use crate::signal::{ShutdownGuard, ShutdownToken};
use crate::sync::{SyncReport, Synchronizer};

/// Outcome of one family's run
pub type FamilyOutcome = (AddressFamily, String, Result<SyncReport, SyncError>);

/// Run the ipset command
pub async fn run(args: IpsetArgs, mut config: Config) -> Result<()> {
    apply_args(&mut config, &args)?;
    config.validate_ipset()?;

    let families = enabled_families(&config);
    if families.is_empty() {
        warn!("Both IPv4 and IPv6 are skipped, nothing to do");
        return Ok(());
    }

    if !args.dry_run {
        check_root()?;
    }

    let transport = create_transport(config.transport)?;
    let facility = Arc::new(IpsetCommand::new());
    let shutdown = ShutdownToken::new();
    let _guard = ShutdownGuard::new(shutdown.clone());

    let sync = Synchronizer::new(transport.as_ref(), facility, shutdown)
        .with_work_dir(config.work_dir.clone());

    if args.dry_run {
        info!("Dry run: sets will not be modified");
    }
    let outcomes = sync_families(&sync, &config, &families, args.dry_run).await;
    summarize(&outcomes)
}

/// Layer command-line flags over the loaded configuration.
pub fn apply_args(config: &mut Config, args: &IpsetArgs) -> Result<()> {
    if let Some(name) = &args.v4_set {
        config.ipset.ipv4.set_name = name.clone();
    }
    if let Some(name) = &args.v6_set {
        config.ipset.ipv6.set_name = name.clone();
    }
    if let Some(url) = &args.v4_url {
        config.ipset.ipv4.url = url.clone();
    }
    if let Some(url) = &args.v6_url {
        config.ipset.ipv6.url = url.clone();
    }
    if args.skip_v4 {
        config.ipset.ipv4.enabled = false;
    }
    if args.skip_v6 {
        config.ipset.ipv6.enabled = false;
    }
    if let Some(kind) = &args.transport {
        config.transport = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    }
    Ok(())
}

/// Families whose target is enabled, IPv4 first.
pub fn enabled_families(config: &Config) -> Vec<AddressFamily> {
    [AddressFamily::Inet, AddressFamily::Inet6]
        .into_iter()
        .filter(|family| config.ipset.target(*family).enabled)
        .collect()
}

/// Synchronize every family concurrently; the sets are independent.
///
/// Each family's set work runs on its own blocking thread.
pub async fn sync_families(
    sync: &Synchronizer<'_>,
    config: &Config,
    families: &[AddressFamily],
    dry_run: bool,
) -> Vec<FamilyOutcome> {
    let runs = families.iter().map(|&family| {
        let target = config.ipset.target(family);
        async move {
            let result = if dry_run {
                sync.preview(&target.url, &target.set_name, family).await
            } else {
                sync.synchronize(&target.url, &target.set_name, family).await
            };
            (family, target.set_name.clone(), result)
        }
    });
    futures::future::join_all(runs).await
}

/// Print one line per family and fail if any family failed.
pub fn summarize(outcomes: &[FamilyOutcome]) -> Result<()> {
    let mut failed = 0;

    println!();
    for (family, set_name, result) in outcomes {
        match result {
            Ok(report) => println!("{}", report.summary()),
            Err(e) => {
                failed += 1;
                error!("{} set {}: {}", family.label(), set_name, e);
                println!("[FAILED] {} set {}: {}", family.label(), set_name, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} list(s) failed to synchronize", failed, outcomes.len());
    }
    Ok(())
}
