//! dnsmasq fragment installation.
//!
//! Upstream fragments route domains to a fixed resolver, for example
//! `server=/example.cn/114.114.114.114`. Installing one replaces that
//! placeholder resolver with the operator's own and, when IPv6 is
//! enabled, duplicates each such line for the IPv6 resolver.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::DnsmasqConfig;
use crate::fetcher::{file_name_from_url, Transport};
use crate::signal::ShutdownToken;
use crate::sync::download_list;
use crate::utils::format_count;

/// Mode of installed fragments
pub const FRAGMENT_MODE: u32 = 0o644;

/// Resolver substitution settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub placeholder: String,
    pub ipv4: String,
    /// Set only when IPv6 output is enabled
    pub ipv6: Option<String>,
}

impl RenderOptions {
    pub fn from_config(config: &DnsmasqConfig) -> Self {
        Self {
            placeholder: config.placeholder.clone(),
            ipv4: config.ipv4.clone(),
            ipv6: if config.ipv6_enabled {
                config.ipv6.clone()
            } else {
                None
            },
        }
    }
}

/// Counters from rendering one fragment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Lines written
    pub lines: usize,
    /// Source lines that carried the placeholder
    pub substituted: usize,
}

/// Result of installing one fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub url: String,
    pub path: PathBuf,
    pub stats: RenderStats,
}

/// Render one line, writing one or two output lines.
pub fn render_line<W: Write>(line: &str, opts: &RenderOptions, out: &mut W) -> io::Result<RenderStats> {
    if opts.placeholder.is_empty() || !line.contains(&opts.placeholder) {
        writeln!(out, "{}", line)?;
        return Ok(RenderStats {
            lines: 1,
            substituted: 0,
        });
    }

    writeln!(out, "{}", line.replace(&opts.placeholder, &opts.ipv4))?;
    let mut stats = RenderStats {
        lines: 1,
        substituted: 1,
    };
    if let Some(ipv6) = &opts.ipv6 {
        writeln!(out, "{}", line.replace(&opts.placeholder, ipv6))?;
        stats.lines += 1;
    }
    Ok(stats)
}

/// Render a whole fragment, normalizing line endings to `\n`.
pub fn render<R: BufRead, W: Write>(mut reader: R, out: &mut W, opts: &RenderOptions) -> io::Result<RenderStats> {
    let mut stats = RenderStats::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        let line = String::from_utf8_lossy(&buf);
        let line_stats = render_line(&line, opts, out)?;
        stats.lines += line_stats.lines;
        stats.substituted += line_stats.substituted;
    }
    Ok(stats)
}

/// Write a rendered fragment into `dir/name` atomically with mode 0644.
///
/// Uses tempfile + rename in the target directory so dnsmasq never sees a
/// half-written file.
pub fn write_fragment(source: File, dir: &Path, name: &Path, opts: &RenderOptions) -> Result<(PathBuf, RenderStats)> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {:?}", dir))?;

    let target = dir.join(name);
    let temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {:?}", dir))?;

    let stats = {
        let mut writer = BufWriter::new(temp.as_file());
        let stats = render(BufReader::new(source), &mut writer, opts)
            .context("Failed to render dnsmasq fragment")?;
        writer.flush()?;
        stats
    };
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), fs::Permissions::from_mode(FRAGMENT_MODE))
        .context("Failed to set fragment permissions")?;

    temp.persist(&target)
        .with_context(|| format!("Failed to install {:?}", target))?;
    Ok((target, stats))
}

/// Download one fragment and install it into `dir`.
pub async fn install_fragment(
    transport: &dyn Transport,
    url: &str,
    dir: &Path,
    opts: &RenderOptions,
    work_dir: Option<&PathBuf>,
    shutdown: &ShutdownToken,
) -> Result<InstallReport> {
    let name = file_name_from_url(url)
        .with_context(|| format!("Cannot derive a file name from {}", url))?;

    info!("Fetching {}...", url);
    let (artifact, _bytes) = download_list(transport, url, work_dir, shutdown).await?;

    let (path, stats) = write_fragment(artifact.reopen()?, dir, &name, opts)?;
    debug!("Installed {:?} ({} lines)", path, stats.lines);
    info!(
        "Installed {:?} ({} server lines rewritten)",
        path,
        format_count(stats.substituted)
    );

    Ok(InstallReport {
        url: url.to_string(),
        path,
        stats,
    })
}
