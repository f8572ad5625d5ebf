//! # listsync - address lists into IP sets
//!
//! Small maintenance tool for Linux and OpenWrt gateways:
//!
//! - **ipset** - download plaintext IPv4/IPv6 address lists and load them
//!   into named kernel IP sets, replacing the previous contents
//! - **dnsmasq** - download dnsmasq fragments, swap their placeholder
//!   resolver for your own, and install them with mode 0644
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (clap) + Config (serde_yaml, LISTSYNC_* env, flags)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Synchronizer                                               │
//! │    fetch -> reject empty -> flush/create -> stream + add    │
//! ├──────────────────────┬──────────────────────────────────────┤
//! │  Transport           │  IpSetFacility                       │
//! │    builtin (reqwest) │    IpsetCommand (ipset(8))           │
//! │    curl / wget       │    in-memory (tests)                 │
//! └──────────────────────┴──────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use listsync::fetcher::HttpTransport;
//! use listsync::ipset::{check_root, AddressFamily, IpsetCommand};
//! use listsync::signal::ShutdownToken;
//! use listsync::sync::Synchronizer;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     check_root()?;
//!
//!     let transport = HttpTransport::new()?;
//!     let facility = Arc::new(IpsetCommand::new());
//!     let sync = Synchronizer::new(&transport, facility, ShutdownToken::new());
//!
//!     let report = sync
//!         .synchronize(
//!             "https://raw.githubusercontent.com/misakaio/chnroutes2/master/chnroutes.txt",
//!             "chnroute",
//!             AddressFamily::Inet,
//!         )
//!         .await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`commands`] - CLI command implementations
//! - [`config`] - Layered configuration
//! - [`dnsmasq`] - dnsmasq fragment rendering and installation
//! - [`fetcher`] - Download transports
//! - [`ipset`] - Kernel IP set facility
//! - [`parser`] - Lazy address list parsing
//! - [`signal`] - Interruption handling
//! - [`sync`] - List-to-set synchronization

pub mod cli;
pub mod cmd_abstraction;
pub mod commands;
pub mod config;
pub mod dnsmasq;
pub mod error;
pub mod fetcher;
pub mod ipset;
pub mod parser;
pub mod signal;
pub mod sync;
pub mod utils;
pub mod validation;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{FetchError, SyncError, TokenAddError};
