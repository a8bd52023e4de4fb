// src/error.rs
// =============================================================================
// Errors that abort a mirror run.
//
// Only fatal outcomes live here. A 404, 401 or 500 response is NOT an error:
// it is written into the resource's metadata record and the run continues.
//
// Rust concepts:
// - thiserror: derives Display and std::error::Error from attributes
// - #[source]: keeps the underlying cause attached for error chains
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
    /// The crawl root could not be turned into an origin and base path
    #[error("invalid crawl root '{url}': {reason}")]
    InvalidRoot { url: String, reason: String },

    /// A configuration value was rejected during validation
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// DNS, connection, TLS or body read failure
    #[error("Request Error: {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Any status other than 200, 304, 401, 404 or 500
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// Creating directories or writing a mirrored file failed
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTML rewriter rejected a document
    #[error("failed to rewrite HTML of {path}: {reason}")]
    Rewrite { path: String, reason: String },

    #[error("failed to read metadata {}: {source}", path.display())]
    ReadMetadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unparsable metadata {}: {source}", path.display())]
    ParseMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to create {}: {reason}", path.display())]
    PersistMetadata { path: PathBuf, reason: String },
}
