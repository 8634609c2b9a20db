//! Tool configuration: file, defaults, validation.

use crate::aggregator::DEFAULT_CONCURRENCY;
use crate::catalog::CatalogOptions;
use crate::error::ConfigError;
use crate::policy::ExitPolicy;
use crate::redact::Redactor;
use crate::session::{ConnectOptions, DEFAULT_CEPH_BINARY, DEFAULT_CEPH_CONFIG, DEFAULT_CLIENT_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default location of the optional tool configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ceph-fact/ceph-fact.toml";

/// Tool settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactsConfig {
    /// Cluster configuration file
    pub ceph_config: PathBuf,
    /// cephx identity
    pub client_name: String,
    /// Keyring path
    pub keyring: Option<PathBuf>,
    /// `ceph` client executable
    pub ceph_binary: String,
    /// Connect and per-query timeout
    pub timeout_secs: u64,
    /// Queries in flight
    pub concurrency: usize,
    /// Catalog entries to leave out
    pub skip: Vec<String>,
    /// Collect device health metrics
    pub device_health_metrics: bool,
    /// Extra redaction filters for the config dump
    pub config_filters: Vec<String>,
    /// Log the redacted config dump
    pub log_gathered_config: bool,
    /// Exit status policy
    pub exit_policy: ExitPolicy,
}

impl Default for FactsConfig {
    fn default() -> Self {
        Self {
            ceph_config: PathBuf::from(DEFAULT_CEPH_CONFIG),
            client_name: String::from(DEFAULT_CLIENT_NAME),
            keyring: None,
            ceph_binary: String::from(DEFAULT_CEPH_BINARY),
            timeout_secs: 10,
            concurrency: DEFAULT_CONCURRENCY,
            skip: Vec::new(),
            device_health_metrics: false,
            config_filters: Vec::new(),
            log_gathered_config: false,
            exit_policy: ExitPolicy::Primary,
        }
    }
}

impl FactsConfig {
    /// Loads a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let parse_err = |reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents).map_err(|e| parse_err(e.to_string())),
            "json" => serde_json::from_str(&contents).map_err(|e| parse_err(e.to_string())),
            _ => Err(ConfigError::UnsupportedExtension(ext.to_string())),
        }
    }

    /// Rejects settings no run could honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Identity and limits for the connector.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            ceph_config: self.ceph_config.clone(),
            client_name: self.client_name.clone(),
            keyring: self.keyring.clone(),
            ceph_binary: self.ceph_binary.clone(),
            timeout: self.timeout(),
        }
    }

    /// Compiles the redaction filters; an invalid pattern is reported here,
    /// before anything talks to the cluster.
    pub fn catalog_options(&self) -> Result<CatalogOptions, ConfigError> {
        Ok(CatalogOptions {
            device_health: self.device_health_metrics,
            redactor: Arc::new(Redactor::new(&self.config_filters)?),
            log_config: self.log_gathered_config,
        })
    }
}
