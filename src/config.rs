//! Configuration management for listsync.
//!
//! The effective configuration is built once at startup from layered
//! sources: built-in defaults, then the YAML file, then `LISTSYNC_*`
//! environment variables, then command-line flags. It is then passed by
//! reference; nothing reads the environment later on.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::fetcher::TransportKind;
use crate::ipset::AddressFamily;
use crate::validation::{validate_resolver, validate_set_name, validate_url};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/listsync/config.yaml";

/// Placeholder resolver used by the upstream dnsmasq-china-list fragments
pub const DEFAULT_PLACEHOLDER: &str = "114.114.114.114";

pub const ENV_V4_URL: &str = "LISTSYNC_V4_URL";
pub const ENV_V6_URL: &str = "LISTSYNC_V6_URL";
pub const ENV_V4_SET: &str = "LISTSYNC_V4_SET";
pub const ENV_V6_SET: &str = "LISTSYNC_V6_SET";
pub const ENV_TRANSPORT: &str = "LISTSYNC_TRANSPORT";
pub const ENV_DNSMASQ_DIR: &str = "LISTSYNC_DNSMASQ_DIR";
pub const ENV_DNS4: &str = "LISTSYNC_DNS4";
pub const ENV_DNS6: &str = "LISTSYNC_DNS6";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Download transport (builtin, curl, wget, auto)
    pub transport: TransportKind,

    /// Directory for temporary downloads (system temp dir if unset)
    pub work_dir: Option<PathBuf>,

    /// IP set targets
    pub ipset: IpsetConfig,

    /// dnsmasq fragment installation
    pub dnsmasq: DnsmasqConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IpsetConfig {
    pub ipv4: ListTarget,
    pub ipv6: ListTarget,
}

impl Default for IpsetConfig {
    fn default() -> Self {
        Self {
            ipv4: ListTarget {
                set_name: "chnroute".to_string(),
                url: "https://raw.githubusercontent.com/misakaio/chnroutes2/master/chnroutes.txt"
                    .to_string(),
                enabled: true,
            },
            ipv6: ListTarget {
                set_name: "chnroute6".to_string(),
                url: "https://raw.githubusercontent.com/gaoyifan/china-operator-ip/ip-lists/china6.txt"
                    .to_string(),
                enabled: true,
            },
        }
    }
}

impl IpsetConfig {
    pub fn target(&self, family: AddressFamily) -> &ListTarget {
        match family {
            AddressFamily::Inet => &self.ipv4,
            AddressFamily::Inet6 => &self.ipv6,
        }
    }
}

/// One address list and the set it feeds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListTarget {
    pub set_name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DnsmasqConfig {
    /// Fragments to download; installed under their URL file name
    pub urls: Vec<String>,
    /// Directory dnsmasq reads fragments from
    pub target_dir: PathBuf,
    /// Resolver address in upstream fragments to be replaced
    pub placeholder: String,
    /// IPv4 resolver written in place of the placeholder
    pub ipv4: String,
    /// IPv6 resolver, emitted as an extra line when enabled
    pub ipv6: Option<String>,
    pub ipv6_enabled: bool,
}

impl Default for DnsmasqConfig {
    fn default() -> Self {
        Self {
            urls: vec![
                "https://raw.githubusercontent.com/felixonmars/dnsmasq-china-list/master/accelerated-domains.china.conf"
                    .to_string(),
            ],
            target_dir: PathBuf::from("/etc/dnsmasq.d"),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            ipv4: DEFAULT_PLACEHOLDER.to_string(),
            ipv6: None,
            ipv6_enabled: false,
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Defaults, then the file (if any), then the process environment.
    ///
    /// A missing file is only an error when the path was given explicitly.
    pub fn load_layered(path: &Path, explicit: bool) -> Result<Self> {
        let mut config = if explicit || path.exists() {
            Self::load(path)?
        } else {
            debug!("No config file at {:?}, using defaults", path);
            Self::default()
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `LISTSYNC_*` overrides from a variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = get(ENV_V4_URL) {
            self.ipset.ipv4.url = url;
        }
        if let Some(url) = get(ENV_V6_URL) {
            self.ipset.ipv6.url = url;
        }
        if let Some(name) = get(ENV_V4_SET) {
            self.ipset.ipv4.set_name = name;
        }
        if let Some(name) = get(ENV_V6_SET) {
            self.ipset.ipv6.set_name = name;
        }
        if let Some(kind) = get(ENV_TRANSPORT) {
            self.transport = kind
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{}: {}", ENV_TRANSPORT, e))?;
        }
        if let Some(dir) = get(ENV_DNSMASQ_DIR) {
            self.dnsmasq.target_dir = PathBuf::from(dir);
        }
        if let Some(dns4) = get(ENV_DNS4) {
            self.dnsmasq.ipv4 = dns4;
        }
        if let Some(dns6) = get(ENV_DNS6) {
            self.dnsmasq.ipv6 = Some(dns6);
        }
        Ok(())
    }

    /// Validate the IP set section.
    pub fn validate_ipset(&self) -> Result<()> {
        let v4 = &self.ipset.ipv4;
        let v6 = &self.ipset.ipv6;

        for (family, target) in [(AddressFamily::Inet, v4), (AddressFamily::Inet6, v6)] {
            if !target.enabled {
                continue;
            }
            validate_set_name(&target.set_name)
                .with_context(|| format!("Invalid {} set name", family.label()))?;
            validate_url(&target.url)
                .with_context(|| format!("Invalid {} list URL", family.label()))?;
        }

        if v4.enabled && v6.enabled && v4.set_name == v6.set_name {
            anyhow::bail!(
                "IPv4 and IPv6 lists cannot share the set name '{}'",
                v4.set_name
            );
        }
        Ok(())
    }

    /// Validate the dnsmasq section.
    pub fn validate_dnsmasq(&self) -> Result<()> {
        let dns = &self.dnsmasq;
        if dns.urls.is_empty() {
            anyhow::bail!("No dnsmasq fragment URLs configured");
        }
        for url in &dns.urls {
            validate_url(url)?;
        }
        if dns.placeholder.trim().is_empty() {
            anyhow::bail!("dnsmasq placeholder address cannot be empty");
        }
        validate_resolver(&dns.ipv4, AddressFamily::Inet)?;
        if dns.ipv6_enabled {
            match &dns.ipv6 {
                Some(addr) => {
                    validate_resolver(addr, AddressFamily::Inet6)?;
                }
                None => anyhow::bail!("IPv6 is enabled for dnsmasq but no IPv6 DNS server is set"),
            }
        }
        Ok(())
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.validate_ipset()?;
        self.validate_dnsmasq()
    }

    /// Render as YAML (used by the `config` command).
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}
