//! List-to-ipset synchronization.
//!
//! One run is a linear, idempotent sequence:
//!
//! 1. download the list to a private temporary file
//! 2. refuse an empty download (the set is left untouched)
//! 3. flush the set if it exists, create it otherwise
//! 4. stream the file line by line and add every valid token
//!
//! The set is fully replaced each run, so a failed or interrupted run is
//! recovered by simply running again. Concurrent runs against the same set
//! name are not serialized here and must be avoided by the operator.
//!
//! Steps 3 and 4 call the facility synchronously (one `ipset` process per
//! token) and therefore run on tokio's blocking pool.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{SyncError, TokenAddError};
use crate::fetcher::Transport;
use crate::ipset::{AddressFamily, IpSetFacility, SetSpec};
use crate::parser::tokens;
use crate::signal::ShutdownToken;
use crate::utils::{format_count, format_size};
use crate::validation::validate_token;

/// Outcome of one synchronization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub set_name: String,
    pub family: AddressFamily,
    /// Tokens successfully added to the set
    pub imported: usize,
    /// Tokens that were malformed or refused by the facility
    pub rejected: usize,
    /// Size of the downloaded list
    pub bytes: u64,
}

impl SyncReport {
    /// One-line summary for the operator.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "[OK] {} set {}: {} entries imported",
            self.family.label(),
            self.set_name,
            format_count(self.imported)
        );
        if self.rejected > 0 {
            line.push_str(&format!(", {} rejected", format_count(self.rejected)));
        }
        line
    }
}

/// Downloads address lists and loads them into IP sets
pub struct Synchronizer<'a> {
    transport: &'a dyn Transport,
    facility: Arc<dyn IpSetFacility>,
    shutdown: ShutdownToken,
    work_dir: Option<PathBuf>,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        facility: Arc<dyn IpSetFacility>,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            transport,
            facility,
            shutdown,
            work_dir: None,
        }
    }

    /// Directory for temporary downloads (default: system temp dir).
    pub fn with_work_dir(mut self, work_dir: Option<PathBuf>) -> Self {
        self.work_dir = work_dir;
        self
    }

    /// Replace the contents of `set_name` with the list at `url`.
    pub async fn synchronize(
        &self,
        url: &str,
        set_name: &str,
        family: AddressFamily,
    ) -> Result<SyncReport, SyncError> {
        info!("Fetching {} list for set {}...", family.label(), set_name);
        let (artifact, bytes) = download_list(self.transport, url, self.work_dir.as_ref(), &self.shutdown).await?;

        let file = artifact.reopen()?;
        let facility = Arc::clone(&self.facility);
        let shutdown = self.shutdown.clone();
        let set = set_name.to_string();
        let (imported, rejected) = tokio::task::spawn_blocking(move || {
            ensure_set(facility.as_ref(), &set, family)?;
            load_tokens(file, family, &shutdown, |token| facility.add(&set, token, true))
        })
        .await
        .map_err(|e| SyncError::Io(e.into()))??;

        if imported == 0 {
            warn!(
                "No entries imported into {} from {} - has the list format changed upstream?",
                set_name, url
            );
        }

        info!(
            "Loaded {} entries into {} ({} downloaded)",
            format_count(imported),
            set_name,
            format_size(bytes)
        );

        Ok(SyncReport {
            set_name: set_name.to_string(),
            family,
            imported,
            rejected,
            bytes,
        })
    }

    /// Fetch and validate a list without touching any set.
    pub async fn preview(
        &self,
        url: &str,
        set_name: &str,
        family: AddressFamily,
    ) -> Result<SyncReport, SyncError> {
        info!("Fetching {} list (dry run)...", family.label());
        let (artifact, bytes) = download_list(self.transport, url, self.work_dir.as_ref(), &self.shutdown).await?;

        let (imported, rejected) =
            load_tokens(artifact.reopen()?, family, &self.shutdown, |_| Ok(()))?;

        if imported == 0 {
            warn!("No valid entries in {} - has the list format changed upstream?", url);
        }

        Ok(SyncReport {
            set_name: set_name.to_string(),
            family,
            imported,
            rejected,
            bytes,
        })
    }
}

/// Flush an existing set, or create it.
fn ensure_set(
    facility: &dyn IpSetFacility,
    set_name: &str,
    family: AddressFamily,
) -> Result<(), SyncError> {
    let provision_err = |e: anyhow::Error| SyncError::SetProvision {
        set: set_name.to_string(),
        reason: e.to_string(),
    };

    if facility.exists(set_name).map_err(provision_err)? {
        debug!("Flushing existing set {}", set_name);
        facility.flush(set_name).map_err(provision_err)?;
    } else {
        debug!("Creating set {} ({})", set_name, family);
        facility
            .create(set_name, &SetSpec::new(family))
            .map_err(provision_err)?;
    }
    Ok(())
}

/// Download `url` into a fresh temporary file.
///
/// The file is removed when the returned guard drops, and also on every
/// error path here, including interruption by the shutdown token.
pub async fn download_list(
    transport: &dyn Transport,
    url: &str,
    work_dir: Option<&PathBuf>,
    shutdown: &ShutdownToken,
) -> Result<(NamedTempFile, u64), SyncError> {
    if shutdown.is_cancelled() {
        return Err(SyncError::Interrupted);
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix("listsync-").suffix(".part");
    let artifact = match work_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    debug!("Downloading {} via {} to {:?}", url, transport.name(), artifact.path());
    let result = tokio::select! {
        r = transport.download(url, artifact.path()) => r,
        _ = shutdown.cancelled() => return Err(SyncError::Interrupted),
    };
    result.map_err(|source| SyncError::Fetch {
        url: url.to_string(),
        source,
    })?;

    // Trust the file, not the transport's count: external tools may rewrite it
    let bytes = artifact.as_file().metadata()?.len();
    if bytes == 0 {
        return Err(SyncError::EmptySource {
            url: url.to_string(),
        });
    }

    Ok((artifact, bytes))
}

/// Stream tokens from `file` into `add`, returning (imported, rejected).
///
/// Per-token failures are logged and counted, never propagated.
pub fn load_tokens<F>(
    file: File,
    family: AddressFamily,
    shutdown: &ShutdownToken,
    mut add: F,
) -> Result<(usize, usize), SyncError>
where
    F: FnMut(&str) -> anyhow::Result<()>,
{
    let mut imported = 0;
    let mut rejected = 0;

    for token in tokens(BufReader::new(file)) {
        if shutdown.is_cancelled() {
            return Err(SyncError::Interrupted);
        }
        let token = token?;

        let outcome = validate_token(&token, family).and_then(|_| add(&token));
        match outcome {
            Ok(()) => imported += 1,
            Err(e) => {
                let err = TokenAddError {
                    token,
                    reason: e.to_string(),
                };
                warn!("{}", err);
                rejected += 1;
            }
        }
    }

    Ok((imported, rejected))
}
