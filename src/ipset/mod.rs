//! Kernel IP set facility.
//!
//! The synchronizer only ever needs four operations on a set, captured by
//! [`IpSetFacility`]. [`IpsetCommand`] drives the real `ipset(8)` tool;
//! tests use the in-memory [`mock::MemoryIpSet`].

mod command;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use command::IpsetCommand;

/// Default hash size hint for newly created sets.
pub const DEFAULT_HASHSIZE: u32 = 1024;

/// Default capacity for newly created sets.
pub const DEFAULT_MAXELEM: u32 = 131_072;

/// Address family of a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// IPv4
    Inet,
    /// IPv6
    Inet6,
}

impl AddressFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::Inet => "inet",
            AddressFamily::Inet6 => "inet6",
        }
    }

    /// Human label used in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            AddressFamily::Inet => "IPv4",
            AddressFamily::Inet6 => "IPv6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inet" | "ipv4" => Ok(AddressFamily::Inet),
            "inet6" | "ipv6" => Ok(AddressFamily::Inet6),
            other => Err(format!("Unknown address family '{}' (use inet or inet6)", other)),
        }
    }
}

/// Creation parameters for a new set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSpec {
    pub family: AddressFamily,
    pub hashsize: u32,
    pub maxelem: u32,
}

impl SetSpec {
    pub fn new(family: AddressFamily) -> Self {
        Self {
            family,
            hashsize: DEFAULT_HASHSIZE,
            maxelem: DEFAULT_MAXELEM,
        }
    }
}

/// The minimal surface of the OS IP set facility.
pub trait IpSetFacility: Send + Sync {
    /// Whether a set with this name exists.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Create a new `hash:net` set.
    fn create(&self, name: &str, spec: &SetSpec) -> Result<()>;

    /// Remove every entry, keeping the set and its type.
    fn flush(&self, name: &str) -> Result<()>;

    /// Add one address or CIDR. With `allow_duplicate`, re-adding is not an error.
    fn add(&self, name: &str, token: &str, allow_duplicate: bool) -> Result<()>;
}

/// Check if running as root (effective UID == 0)
///
/// Creating and filling kernel sets needs CAP_NET_ADMIN; UID 0 covers the
/// usual case of running from cron or with sudo.
pub fn check_root() -> Result<()> {
    // SAFETY: geteuid() has no preconditions, never fails and touches no state.
    let euid = unsafe { libc::geteuid() };

    if euid != 0 {
        anyhow::bail!(
            "This operation requires root privileges. Please run with sudo.\n\
             Alternatively, ensure the process has the CAP_NET_ADMIN capability."
        )
    }
    Ok(())
}
