//! CLI command implementations.

pub mod config;
pub mod dnsmasq;
pub mod ipset;
