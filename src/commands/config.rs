//! Config command implementation.

use anyhow::{Context, Result};

use crate::config::Config;

/// Print the effective configuration (defaults + file + environment)
///
/// The YAML is printed even when validation fails, so the offending value
/// is visible next to the error.
pub fn run(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    config
        .validate()
        .context("Effective configuration is invalid")
}
