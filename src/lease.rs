//! dnsmasq lease database parsing.
//!
//! dnsmasq keeps one lease per line in its lease file:
//!
//! ```text
//! <expiry-epoch-seconds> <mac> <ip> <hostname> <client-id>
//! ```
//!
//! Parsing is lenient. dnsmasq rewrites the file in place, so a
//! read may observe a partially written line; such lines are dropped instead
//! of failing the whole read. A timestamp that does not parse becomes `0` so
//! the rest of the record survives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// dnsmasq writes `*` when the client sent no hostname or client identifier.
pub const UNKNOWN_FIELD: &str = "*";

const LEASE_FIELD_COUNT: usize = 5;

/// A lease as recorded by dnsmasq.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Expiry as seconds since the Unix epoch. `0` marks an infinite lease.
    pub expire_timestamp: u64,

    /// Hardware address of the client.
    pub mac_address: String,

    /// Address handed out to the client.
    pub ip_address: String,

    /// Client-advertised hostname, or [`UNKNOWN_FIELD`].
    pub hostname: String,

    /// DHCP client identifier, or [`UNKNOWN_FIELD`].
    pub client_id: String,
}

impl Lease {
    /// Parses a single lease-file line.
    ///
    /// Returns `None` unless the line splits on single spaces into exactly
    /// five fields.
    pub fn parse_line(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split(' ').collect();
        let [expiry, mac, ip, hostname, client_id] = fields[..] else {
            trace!(
                "Skipping lease line with {} fields (expected {}): {:?}",
                fields.len(),
                LEASE_FIELD_COUNT,
                line
            );
            return None;
        };

        Some(Self {
            expire_timestamp: parse_expiry(expiry),
            mac_address: mac.to_string(),
            ip_address: ip.to_string(),
            hostname: hostname.to_string(),
            client_id: client_id.to_string(),
        })
    }

    /// Returns true for leases dnsmasq never expires.
    pub fn is_infinite(&self) -> bool {
        self.expire_timestamp == 0
    }

    /// Returns the expiry time, or `None` for infinite leases.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.is_infinite() {
            return None;
        }
        i64::try_from(self.expire_timestamp)
            .ok()
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
    }

    /// Returns true if the lease has expired. Infinite leases never do.
    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .is_some_and(|expires_at| Utc::now() > expires_at)
    }

    /// Returns seconds remaining until expiration, 0 if expired, or `None`
    /// for infinite leases.
    pub fn remaining_seconds(&self) -> Option<i64> {
        self.expires_at()
            .map(|expires_at| (expires_at - Utc::now()).num_seconds().max(0))
    }

    /// Returns the hostname unless dnsmasq recorded it as unknown.
    pub fn known_hostname(&self) -> Option<&str> {
        known(&self.hostname)
    }

    /// Returns the client identifier unless dnsmasq recorded none.
    pub fn known_client_id(&self) -> Option<&str> {
        known(&self.client_id)
    }
}

fn known(field: &str) -> Option<&str> {
    (field != UNKNOWN_FIELD).then_some(field)
}

/// Parses the expiry field, falling back to `0` when it is not a `u64`.
fn parse_expiry(field: &str) -> u64 {
    match field.parse::<u64>() {
        Ok(timestamp) => timestamp,
        Err(error) => {
            trace!("Unparsable lease expiry {:?} ({}), using 0", field, error);
            0
        }
    }
}

/// Parses the full contents of a dnsmasq lease file.
///
/// Records come back in file order. Empty and malformed lines are skipped;
/// nothing is deduplicated.
pub fn parse_leases(content: &str) -> Vec<Lease> {
    content
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(Lease::parse_line)
        .collect()
}
