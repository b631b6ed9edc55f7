//! dnsmasq argument synthesis.
//!
//! Every start builds the argument vector from scratch, in this order:
//!
//! 1. fixed flags ([`FIXED_ARGS`])
//! 2. one `--trust-anchor=` flag per DS record in [`TRUST_ANCHOR_FILE`]
//! 3. a `--dhcp-range=` flag derived from the bridge address
//!
//! The configured extra arguments are appended by the supervisor, after all
//! of the above. Nothing is cached, so edits to the trust-anchor file or the
//! bridge address apply on the next restart.

use std::path::Path;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::reader::FileReader;

/// System file holding the DNSSEC root delegation-signer records.
pub const TRUST_ANCHOR_FILE: &str = "/usr/share/dns/root.ds";

/// Flags passed to every dnsmasq instance.
pub const FIXED_ARGS: [&str; 3] = [
    "--keep-in-foreground",
    "--conf-dir=/etc/dnsmasq.d,.dpkg-dist,.dpkg-old,.dpkg-new",
    "--local-service",
];

/// First and last host suffix of the DHCP pool.
const DHCP_POOL_FIRST: u8 = 50;
const DHCP_POOL_LAST: u8 = 250;
const DHCP_LEASE_DURATION: &str = "12h";

/// Builds the internal dnsmasq arguments: fixed flags, trust anchors, DHCP range.
///
/// A missing or unreadable trust-anchor file only drops the trust anchors.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if the bridge
/// address has fewer than three octets.
pub fn internal_args<R: FileReader>(reader: &R, config: &Config) -> Result<Vec<String>> {
    let mut args: Vec<String> = FIXED_ARGS.iter().map(|arg| arg.to_string()).collect();

    match reader.read_to_string(Path::new(TRUST_ANCHOR_FILE)) {
        Ok(content) => args.extend(trust_anchor_args(&content)),
        Err(error) => debug!(
            "No DNSSEC trust anchors from {}: {}",
            TRUST_ANCHOR_FILE, error
        ),
    }

    args.push(dhcp_range_arg(config)?);

    debug!("Synthesized dnsmasq arguments: {:?}", args);
    Ok(args)
}

/// Converts DS records into `--trust-anchor=` flags, one per non-empty line.
///
/// `<domain> IN DS <key-tag> <algorithm> <digest-type> <digest>` becomes
/// `--trust-anchor=<domain>,<key-tag>,<algorithm>,<digest-type>,<digest>`.
/// Lines of any other shape are logged and skipped.
pub fn trust_anchor_args(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let anchor = trust_anchor_arg(line);
            if anchor.is_none() {
                warn!("Skipping malformed trust anchor record: {:?}", line);
            }
            anchor
        })
        .collect()
}

fn trust_anchor_arg(line: &str) -> Option<String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields[..] {
        [domain, "IN", "DS", key_tag, algorithm, digest_type, ref digest @ ..]
            if !digest.is_empty() =>
        {
            Some(format!(
                "--trust-anchor={},{},{},{},{}",
                domain,
                key_tag,
                algorithm,
                digest_type,
                digest.join(",")
            ))
        }
        _ => None,
    }
}

/// Builds the `--dhcp-range=` flag for the bridge's /24.
pub fn dhcp_range_arg(config: &Config) -> Result<String> {
    let prefix = config.dhcp_prefix()?;
    Ok(format!(
        "--dhcp-range={prefix}.{DHCP_POOL_FIRST},{prefix}.{DHCP_POOL_LAST},{DHCP_LEASE_DURATION}"
    ))
}
