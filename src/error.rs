//! Error types for listsync.

use thiserror::Error;

/// Failures of the download transport.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no download tool available (curl or wget required)")]
    Unavailable,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("response too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("{tool} failed: {reason}")]
    Command { tool: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal failures of one list synchronization.
///
/// Any of these aborts the run for that set. The temporary download is
/// always removed before the error reaches the caller.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("source {url} returned an empty list, set left untouched")]
    EmptySource { url: String },

    #[error("cannot provision set {set}: {reason}")]
    SetProvision { set: String, reason: String },

    #[error("interrupted by signal")]
    Interrupted,

    #[error("I/O error on downloaded list: {0}")]
    Io(#[from] std::io::Error),
}

/// A single token that could not be added to a set.
///
/// Never propagated: it is logged and counted as rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot add {token}: {reason}")]
pub struct TokenAddError {
    pub token: String,
    pub reason: String,
}
