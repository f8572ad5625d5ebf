//! Centralized validation functions for listsync.
//!
//! This module provides unified validation for:
//! - address tokens (IP or CIDR of a given family)
//! - set names accepted by `ipset`
//! - source URLs
//! - resolver addresses used in dnsmasq fragments

use anyhow::{bail, Result};
use ipnet::IpNet;
use std::net::IpAddr;

use crate::ipset::AddressFamily;

/// Longest set name the kernel accepts (IPSET_MAXNAMELEN - 1).
pub const MAX_SET_NAME_LEN: usize = 31;

/// Validate an IP address string and return the parsed IpAddr.
///
/// # Examples
/// ```
/// use listsync::validation::validate_ip;
/// assert!(validate_ip("192.168.1.1").is_ok());
/// assert!(validate_ip("::1").is_ok());
/// assert!(validate_ip("invalid").is_err());
/// ```
pub fn validate_ip(ip_str: &str) -> Result<IpAddr> {
    ip_str
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid IP address: {}", ip_str))
}

/// Validate an IP address or CIDR string and return the parsed IpNet.
///
/// A plain address becomes a /32 (IPv4) or /128 (IPv6) network.
///
/// # Examples
/// ```
/// use listsync::validation::validate_ip_or_cidr;
/// assert!(validate_ip_or_cidr("192.168.1.1").is_ok());
/// assert!(validate_ip_or_cidr("192.168.0.0/24").is_ok());
/// assert!(validate_ip_or_cidr("invalid").is_err());
/// ```
pub fn validate_ip_or_cidr(ip_str: &str) -> Result<IpNet> {
    if ip_str.contains('/') {
        ip_str
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid CIDR: {}", ip_str))
    } else {
        let ip: IpAddr = ip_str
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid IP address: {}", ip_str))?;
        Ok(IpNet::from(ip))
    }
}

/// Validate a list token for a set of the given family.
///
/// The token itself is what gets added to the set; the parsed network is
/// only used to check it.
pub fn validate_token(token: &str, family: AddressFamily) -> Result<IpNet> {
    let net = validate_ip_or_cidr(token)?;
    let matches = match (family, net) {
        (AddressFamily::Inet, IpNet::V4(_)) => true,
        (AddressFamily::Inet6, IpNet::V6(_)) => true,
        _ => false,
    };
    if !matches {
        bail!("{} is not an {} address", token, family.label());
    }
    Ok(net)
}

/// Validate a set name as `ipset` would accept it.
///
/// # Examples
/// ```
/// use listsync::validation::validate_set_name;
/// assert!(validate_set_name("chnroute").is_ok());
/// assert!(validate_set_name("").is_err());
/// assert!(validate_set_name("bad name").is_err());
/// ```
pub fn validate_set_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Set name cannot be empty");
    }
    if name.len() > MAX_SET_NAME_LEN {
        bail!(
            "Set name '{}' is too long ({} bytes, max {})",
            name,
            name.len(),
            MAX_SET_NAME_LEN
        );
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        bail!("Set name '{}' contains whitespace or control characters", name);
    }
    if name.starts_with('-') {
        bail!("Set name '{}' cannot start with '-'", name);
    }
    Ok(())
}

/// Validate a source URL: must parse and use http or https.
pub fn validate_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", url, e))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => bail!("URL '{}' must use http or https, not {}", url, other),
    }
    if parsed.host_str().is_none() {
        bail!("URL '{}' has no host", url);
    }
    Ok(())
}

/// Validate a resolver address of the expected family.
pub fn validate_resolver(addr: &str, family: AddressFamily) -> Result<IpAddr> {
    let ip = validate_ip(addr)?;
    match (family, ip) {
        (AddressFamily::Inet, IpAddr::V4(_)) | (AddressFamily::Inet6, IpAddr::V6(_)) => Ok(ip),
        _ => bail!("DNS server {} is not an {} address", addr, family.label()),
    }
}
