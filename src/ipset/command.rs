//! `ipset(8)` command-line backend.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use super::{IpSetFacility, SetSpec};
use crate::cmd_abstraction::{args_to_strings, CommandExecutor, RealCommandExecutor};

const IPSET_BIN: &str = "ipset";

/// Drives kernel sets through the `ipset` tool
pub struct IpsetCommand {
    executor: Arc<dyn CommandExecutor>,
}

impl IpsetCommand {
    pub fn new() -> Self {
        Self::with_executor(Arc::new(RealCommandExecutor::new()))
    }

    pub fn with_executor(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    fn run(&self, args: &[&str]) -> Result<()> {
        debug!("{} {}", IPSET_BIN, args.join(" "));
        let output = self.executor.execute(IPSET_BIN, &args_to_strings(args))?;
        if output.success {
            Ok(())
        } else {
            anyhow::bail!("{} {} failed: {}", IPSET_BIN, args[0], output.failure_reason())
        }
    }
}

impl Default for IpsetCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl IpSetFacility for IpsetCommand {
    fn exists(&self, name: &str) -> Result<bool> {
        let output = self
            .executor
            .execute(IPSET_BIN, &args_to_strings(&["list", "-n", name]))?;
        Ok(output.success)
    }

    fn create(&self, name: &str, spec: &SetSpec) -> Result<()> {
        let hashsize = spec.hashsize.to_string();
        let maxelem = spec.maxelem.to_string();
        self.run(&[
            "create",
            name,
            "hash:net",
            "family",
            spec.family.as_str(),
            "hashsize",
            &hashsize,
            "maxelem",
            &maxelem,
        ])
    }

    fn flush(&self, name: &str) -> Result<()> {
        self.run(&["flush", name])
    }

    fn add(&self, name: &str, token: &str, allow_duplicate: bool) -> Result<()> {
        if allow_duplicate {
            self.run(&["add", name, token, "-exist"])
        } else {
            self.run(&["add", name, token])
        }
    }
}
