//! Error types for ceph-fact.
//!
//! Only [`ConnectionError`] and the configuration/serialization failures are
//! fatal. A [`QueryError`] is scoped to one catalog entry and never aborts a run.

use std::path::PathBuf;
use thiserror::Error;

/// The session to the cluster control plane could not be opened.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The cluster configuration or keyring file could not be read.
    #[error("cannot read {path}: {source}")]
    ConfigUnreadable {
        /// File that failed to open
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The control-plane client executable could not be started.
    #[error("ceph client {binary} could not be started: {reason}")]
    ClientMissing {
        /// Executable that was looked up
        binary: String,
        /// Why the spawn failed
        reason: String,
    },
    /// The monitors did not answer the connection probe in time.
    #[error("no answer from cluster monitors within {timeout_secs}s")]
    Timeout {
        /// Probe timeout in seconds
        timeout_secs: u64,
    },
    /// The probe reached the client but the cluster refused or failed it.
    #[error("cluster unreachable: {reason}")]
    Unreachable {
        /// Client diagnostic
        reason: String,
    },
}

/// Failure of a single catalog query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The query did not complete within the per-query timeout.
    #[error("timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that expired
        timeout_ms: u64,
    },
    /// The identity is not allowed to run the command.
    #[error("permission denied: {reason}")]
    PermissionDenied {
        /// Client diagnostic
        reason: String,
    },
    /// The cluster does not know the command (older or newer release).
    #[error("not supported by this cluster: {reason}")]
    Unsupported {
        /// Client diagnostic
        reason: String,
    },
    /// The command failed with a status the collector does not classify.
    #[error("command failed with status {code}: {stderr}")]
    CommandFailed {
        /// Exit status or errno reported by the client
        code: i32,
        /// Client diagnostic
        stderr: String,
    },
    /// The command succeeded but returned nothing.
    #[error("empty response")]
    EmptyResponse,
    /// The payload is not JSON or not of the expected shape.
    #[error("malformed response: {reason}")]
    MalformedResponse {
        /// What was wrong with the payload
        reason: String,
    },
    /// Local I/O failure while talking to the client.
    #[error("I/O error: {reason}")]
    Io {
        /// I/O error text
        reason: String,
    },
}

impl QueryError {
    /// Short, stable label used in logs and outcome summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Timeout { .. } => "timeout",
            QueryError::PermissionDenied { .. } => "permission_denied",
            QueryError::Unsupported { .. } => "unsupported",
            QueryError::CommandFailed { .. } => "command_failed",
            QueryError::EmptyResponse => "empty_response",
            QueryError::MalformedResponse { .. } => "malformed_response",
            QueryError::Io { .. } => "io",
        }
    }
}

impl From<std::io::Error> for QueryError {
    fn from(e: std::io::Error) -> Self {
        QueryError::Io {
            reason: e.to_string(),
        }
    }
}

/// Invalid key path or an insertion that would collide with existing facts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// The textual path is empty or has an empty segment.
    #[error("invalid key path: {0:?}")]
    InvalidPath(String),
    /// Something already lives at, above or below the path.
    #[error("key path {path} conflicts with an existing fact")]
    PathConflict {
        /// Dotted path that was rejected
        path: String,
    },
}

/// The query catalog violates its own contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Two entries share a name.
    #[error("duplicate query name: {0}")]
    DuplicateName(String),
    /// Two entries target the same or nested key paths.
    #[error("queries {first} and {second} have overlapping key paths")]
    OverlappingPaths {
        /// Earlier entry
        first: String,
        /// Later entry
        second: String,
    },
}

/// Invalid tool configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The config file could not be parsed.
    #[error("cannot parse config {path}: {reason}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Parser diagnostic
        reason: String,
    },
    /// Unknown config file extension.
    #[error("unsupported config file extension: {0}")]
    UnsupportedExtension(String),
    /// A redaction filter is not a valid regular expression.
    #[error("invalid config filter {pattern:?}: {source}")]
    InvalidFilter {
        /// The offending pattern
        pattern: String,
        /// Regex compile error
        #[source]
        source: regex::Error,
    },
    /// Concurrency must be at least one.
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    /// The timeout must be at least one second.
    #[error("timeout must be at least 1 second")]
    ZeroTimeout,
    /// A `--skip` name does not exist in the catalog.
    #[error("unknown query name: {0}")]
    UnknownQuery(String),
}

/// Top-level error of a collection run.
#[derive(Debug, Error)]
pub enum FactsError {
    /// Fatal connection failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Invalid catalog.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Document assembly violated a catalog contract.
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// The assembled document could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Writing the document failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias for fallible ceph-fact operations.
pub type Result<T> = std::result::Result<T, FactsError>;
