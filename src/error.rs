//! Error types for the dnsmasq supervisor.
//!
//! All fallible operations in this crate return [`Result<T>`], which uses
//! the [`Error`] enum for error variants. Malformed lease or trust-anchor
//! lines are never reported here; they are skipped or defaulted instead.

use std::path::PathBuf;

/// Errors that can occur while supervising dnsmasq.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The dnsmasq process could not be created.
    ///
    /// Usually the binary is missing from `PATH` or is not executable.
    /// No process handle is retained, so a later start may retry.
    #[error("Failed to launch dnsmasq: {0}")]
    Launch(#[source] std::io::Error),

    /// The kill signal could not be delivered to the running process.
    #[error("Failed to terminate dnsmasq: {0}")]
    Termination(#[source] std::io::Error),

    /// The file reader could not read the given path.
    ///
    /// Covers not-found, permission denied and other I/O failures while
    /// reading the lease database.
    #[error("Failed to read {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid supervisor configuration.
    ///
    /// Returned by [`Config::validate`](crate::Config::validate) and by
    /// argument synthesis when the bridge address has fewer than three
    /// dot-separated components.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for supervisor operations.
pub type Result<T> = std::result::Result<T, Error>;
