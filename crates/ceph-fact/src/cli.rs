//! Command-line surface.

use crate::collector::Collector;
use crate::config::{FactsConfig, DEFAULT_CONFIG_PATH};
use crate::logging::{LogFormat, LogOptions};
use crate::policy::{ExitPolicy, EXIT_OK};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Command line. Every option overrides the config file.
#[derive(Parser, Debug)]
#[command(name = "ceph-fact")]
#[command(about = "Gather Ceph cluster state as JSON facts", long_about = None)]
pub struct Cli {
    /// Tool config file (TOML or JSON); optional unless given explicitly
    #[arg(long, env = "CEPH_FACT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Ceph configuration file
    #[arg(long, env = "CEPH_CONF")]
    pub ceph_config: Option<PathBuf>,

    /// cephx client name
    #[arg(long)]
    pub name: Option<String>,

    /// Keyring path
    #[arg(long)]
    pub keyring: Option<PathBuf>,

    /// ceph client executable
    #[arg(long)]
    pub ceph_binary: Option<String>,

    /// Connect and per-query timeout in seconds
    #[arg(long, env = "CEPH_FACT_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Queries in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Leave out a query by name (repeatable)
    #[arg(long = "skip")]
    pub skip: Vec<String>,

    /// Collect device health metrics
    #[arg(long)]
    pub device_health_metrics: bool,

    /// Extra regex hiding config dump values (repeatable)
    #[arg(long = "config-filter")]
    pub config_filters: Vec<String>,

    /// Log the redacted config dump
    #[arg(long)]
    pub log_gathered_config: bool,

    /// When to exit non-zero after a document was emitted
    #[arg(long, value_enum)]
    pub exit_policy: Option<ExitPolicy>,

    /// Debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Print the query catalog and exit
    #[arg(long)]
    pub list_queries: bool,
}

impl Cli {
    /// Reads the config file, if any, and layers the command line on top.
    pub fn resolve_config(&self) -> Result<FactsConfig> {
        let mut config = match self.config {
            Some(ref path) => FactsConfig::from_file(path)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    FactsConfig::from_file(&default_path)?
                } else {
                    tracing::debug!(
                        "Config file not found, using defaults: {}",
                        default_path.display()
                    );
                    FactsConfig::default()
                }
            }
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut FactsConfig) {
        if let Some(ref path) = self.ceph_config {
            config.ceph_config = path.clone();
        }
        if let Some(ref name) = self.name {
            config.client_name = name.clone();
        }
        if let Some(ref keyring) = self.keyring {
            config.keyring = Some(keyring.clone());
        }
        if let Some(ref binary) = self.ceph_binary {
            config.ceph_binary = binary.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(policy) = self.exit_policy {
            config.exit_policy = policy;
        }
        config.skip.extend(self.skip.iter().cloned());
        config.config_filters.extend(self.config_filters.iter().cloned());
        config.device_health_metrics |= self.device_health_metrics;
        config.log_gathered_config |= self.log_gathered_config;
    }

    /// Logging setup for this invocation. The gathered config is let through
    /// when either the flag or the config file asks for it.
    pub fn log_options(&self, config: Option<&FactsConfig>) -> LogOptions {
        LogOptions {
            debug: self.debug,
            format: self.log_format,
            gathered_config: config.map_or(self.log_gathered_config, |c| c.log_gathered_config),
        }
    }

    /// Runs the tool on a resolved config. Configuration errors come back as
    /// `Err`; everything after that is reported through the exit code.
    pub async fn run(self, config: FactsConfig) -> Result<ExitCode> {
        let collector = Collector::new(config)?;

        if self.list_queries {
            print!("{}", collector.catalog().describe());
            return Ok(ExitCode::from(EXIT_OK));
        }

        let stdout = std::io::stdout();
        let code = collector.execute(stdout.lock()).await;
        Ok(ExitCode::from(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_no_arguments() {
        let cli = Cli::parse_from(["ceph-fact"]);
        assert!(cli.config.is_none());
        assert!(!cli.debug);
        assert!(!cli.list_queries);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "ceph-fact",
            "--ceph-config",
            "/tmp/ceph.conf",
            "--name",
            "client.ro",
            "--timeout",
            "3",
            "--concurrency",
            "2",
            "--exit-policy",
            "strict",
        ]);
        let mut config = FactsConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.ceph_config, PathBuf::from("/tmp/ceph.conf"));
        assert_eq!(config.client_name, "client.ro");
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.exit_policy, ExitPolicy::Strict);
    }

    #[test]
    fn test_cli_repeatable_flags() {
        let cli = Cli::parse_from([
            "ceph-fact",
            "--skip",
            "osd-perf",
            "--skip",
            "fs-status",
            "--config-filter",
            "(?i)token",
        ]);
        assert_eq!(cli.skip, vec!["osd-perf", "fs-status"]);
        assert_eq!(cli.config_filters, vec!["(?i)token"]);
    }

    #[test]
    fn test_cli_switches() {
        let cli = Cli::parse_from([
            "ceph-fact",
            "--device-health-metrics",
            "--log-gathered-config",
            "--debug",
            "--log-format",
            "json",
            "--list-queries",
        ]);
        assert!(cli.device_health_metrics);
        assert!(cli.log_gathered_config);
        assert!(cli.debug);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.list_queries);
    }

    #[test]
    fn test_cli_rejects_unknown_policy() {
        assert!(Cli::try_parse_from(["ceph-fact", "--exit-policy", "sometimes"]).is_err());
    }

    #[test]
    fn test_resolve_config_layers_cli_over_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
timeout_secs = 30
skip = ["osd-perf"]
device_health_metrics = true
            "#
        )
        .unwrap();

        let cli = Cli::parse_from([
            "ceph-fact",
            "--config",
            file.path().to_str().unwrap(),
            "--timeout",
            "5",
            "--skip",
            "fs-status",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.skip, vec!["osd-perf", "fs-status"]);
        assert!(config.device_health_metrics);
    }

    #[test]
    fn test_resolve_config_explicit_missing_file_fails() {
        let cli = Cli::parse_from(["ceph-fact", "--config", "/nonexistent/ceph-fact.toml"]);
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn test_log_options_follow_gathered_config() {
        let cli = Cli::parse_from(["ceph-fact", "--log-gathered-config"]);
        let config = cli.resolve_config().unwrap();
        let options = cli.log_options(Some(&config));
        assert!(options.gathered_config);
        assert!(!options.debug);

        let from_file = FactsConfig {
            log_gathered_config: true,
            ..FactsConfig::default()
        };
        let cli = Cli::parse_from(["ceph-fact"]);
        assert!(cli.log_options(Some(&from_file)).gathered_config);
        assert!(!cli.log_options(None).gathered_config);
    }
}
