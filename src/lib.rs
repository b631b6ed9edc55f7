//! # dnsmasq-supervisor
//!
//! Runs a single `dnsmasq` instance for a bridged network and reads back the
//! leases it hands out.
//!
//! ## Features
//!
//! - Idempotent start, stop and restart of one dnsmasq process
//! - Argument synthesis: fixed flags, DNSSEC trust anchors from the system
//!   root DS file, and a DHCP range derived from the bridge address
//! - Lenient parsing of the dnsmasq lease database
//!
//! ## Quick Start
//!
//! ```no_run
//! use dnsmasq_supervisor::{Config, DnsmasqSupervisor};
//!
//! #[tokio::main]
//! async fn main() -> dnsmasq_supervisor::Result<()> {
//!     let config = Config::load_or_create("config.json")?;
//!     let mut supervisor = DnsmasqSupervisor::new(config);
//!     supervisor.start()?;
//!     tokio::signal::ctrl_c().await?;
//!     supervisor.stop()
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`Config`] - Bridge address and extra dnsmasq arguments
//! - [`DnsmasqSupervisor`] - Owns the process handle, reads leases
//! - [`args`] - Builds the dnsmasq argument vector
//! - [`Lease`] - One record of the lease database
//! - [`FileReader`] / [`Launcher`] - Seams for file access and process creation

pub mod args;
pub mod config;
pub mod error;
pub mod lease;
pub mod reader;
pub mod supervisor;

pub use config::Config;
pub use error::{Error, Result};
pub use lease::{Lease, parse_leases};
pub use reader::{FileReader, FsReader};
pub use supervisor::{DnsmasqSupervisor, Launcher, ManagedProcess, TokioLauncher};
