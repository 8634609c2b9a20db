//! Connection to the cluster control plane.
//!
//! The [`ControlPlane`] trait is the seam between the collector and whatever
//! speaks to the monitors. [`CephCli`] drives the stock `ceph` client, one
//! child process per command. [`Connector`] probes the plane once and hands
//! out the [`Session`] every query of a run shares.

use crate::error::{ConnectionError, QueryError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Default location of the cluster configuration.
pub const DEFAULT_CEPH_CONFIG: &str = "/etc/ceph/ceph.conf";
/// Default cephx identity.
pub const DEFAULT_CLIENT_NAME: &str = "client.admin";
/// Default client executable.
pub const DEFAULT_CEPH_BINARY: &str = "ceph";

/// A read-only monitor or manager command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonCommand {
    /// Command prefix, e.g. `osd metadata`.
    pub prefix: String,
    /// Named arguments in the order the command declares them.
    pub args: Vec<(String, String)>,
}

impl MonCommand {
    /// A command without arguments.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            args: Vec::new(),
        }
    }

    /// Adds a named argument.
    pub fn arg(mut self, name: &str, value: &str) -> Self {
        self.args.push((name.to_string(), value.to_string()));
        self
    }

    /// The JSON request body a librados `mon_command` expects.
    pub fn to_json(&self) -> Value {
        let mut cmd = Map::new();
        for (name, value) in &self.args {
            cmd.insert(name.clone(), Value::String(value.clone()));
        }
        cmd.insert("prefix".to_string(), Value::String(self.prefix.clone()));
        cmd.insert("format".to_string(), Value::String("json".to_string()));
        Value::Object(cmd)
    }

    /// Positional words for the `ceph` command-line client.
    pub fn cli_words(&self) -> Vec<String> {
        self.prefix
            .split_whitespace()
            .map(str::to_string)
            .chain(self.args.iter().map(|(_, value)| value.clone()))
            .collect()
    }
}

impl fmt::Display for MonCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cli_words().join(" "))
    }
}

/// Anything able to run read-only commands against the cluster monitors.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Runs one command and returns its raw JSON output.
    async fn mon_command(&self, cmd: &MonCommand) -> Result<Vec<u8>, QueryError>;

    /// Whether several commands may be in flight at once.
    fn supports_concurrency(&self) -> bool {
        true
    }

    /// Releases whatever the plane holds. Called once at the end of a run.
    async fn shutdown(&self) {}
}

/// Ambient identity and limits used to reach the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// `ceph.conf` location.
    pub ceph_config: PathBuf,
    /// cephx client name.
    pub client_name: String,
    /// Keyring location; the key itself is never handled here.
    pub keyring: Option<PathBuf>,
    /// Client executable.
    pub ceph_binary: String,
    /// Connect and per-command timeout.
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            ceph_config: PathBuf::from(DEFAULT_CEPH_CONFIG),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            keyring: None,
            ceph_binary: DEFAULT_CEPH_BINARY.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Drives the `ceph` command-line client.
#[derive(Debug, Clone)]
pub struct CephCli {
    options: ConnectOptions,
}

impl CephCli {
    /// Creates a client wrapper; nothing is spawned yet.
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--conf".to_string(),
            self.options.ceph_config.display().to_string(),
            "--name".to_string(),
            self.options.client_name.clone(),
        ];
        if let Some(ref keyring) = self.options.keyring {
            args.push("--keyring".to_string());
            args.push(keyring.display().to_string());
        }
        args.push("--connect-timeout".to_string());
        args.push(self.options.timeout.as_secs().max(1).to_string());
        args.push("--format".to_string());
        args.push("json".to_string());
        args
    }

    /// Full argument vector for `cmd`.
    pub fn command_line(&self, cmd: &MonCommand) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(cmd.cli_words());
        args
    }
}

/// Maps a `ceph` client exit status to a query failure. The client exits
/// with the errno the monitor answered with.
pub fn classify_exit(code: i32, stderr: &str, timeout: Duration) -> QueryError {
    let reason = stderr.trim().to_string();
    match code {
        13 => QueryError::PermissionDenied { reason },
        22 | 95 => QueryError::Unsupported { reason },
        110 => QueryError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        },
        _ => QueryError::CommandFailed {
            code,
            stderr: reason,
        },
    }
}

#[async_trait]
impl ControlPlane for CephCli {
    async fn mon_command(&self, cmd: &MonCommand) -> Result<Vec<u8>, QueryError> {
        let args = self.command_line(cmd);
        debug!("Executing: {} {:?}", self.options.ceph_binary, args);

        let output = Command::new(&self.options.ceph_binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_exit(
                output.status.code().unwrap_or(-1),
                &stderr,
                self.options.timeout,
            ));
        }
        Ok(output.stdout)
    }
}

/// The live handle shared by every query of one run.
pub struct Session {
    plane: Arc<dyn ControlPlane>,
    fsid: String,
}

impl Session {
    /// Cluster fsid reported while connecting.
    pub fn fsid(&self) -> &str {
        &self.fsid
    }

    /// Runs one command on the underlying plane.
    pub async fn mon_command(&self, cmd: &MonCommand) -> Result<Vec<u8>, QueryError> {
        self.plane.mon_command(cmd).await
    }

    /// Whether the plane takes concurrent commands.
    pub fn supports_concurrency(&self) -> bool {
        self.plane.supports_concurrency()
    }

    /// Ends the session.
    pub async fn close(self) {
        debug!("Closing session to cluster {}", self.fsid);
        self.plane.shutdown().await;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("fsid", &self.fsid).finish()
    }
}

/// Opens the one session a run uses.
pub struct Connector {
    options: ConnectOptions,
}

impl Connector {
    /// Creates a connector for the given identity.
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }

    /// Checks the ambient config, then probes the cluster through the
    /// `ceph` client.
    pub async fn open(&self) -> Result<Session, ConnectionError> {
        self.check_readable(&self.options.ceph_config).await?;
        if let Some(ref keyring) = self.options.keyring {
            self.check_readable(keyring).await?;
        }
        debug!(
            "Using Ceph configuration file: {}",
            self.options.ceph_config.display()
        );
        let plane = Arc::new(CephCli::new(self.options.clone()));
        self.open_with(plane).await
    }

    /// Probes an arbitrary plane and wraps it in a session.
    pub async fn open_with(
        &self,
        plane: Arc<dyn ControlPlane>,
    ) -> Result<Session, ConnectionError> {
        debug!("Connecting to Ceph cluster");
        let probe = MonCommand::new("fsid");
        let timeout = self.options.timeout;

        let raw = match tokio::time::timeout(timeout, plane.mon_command(&probe)).await {
            Err(_) => {
                return Err(ConnectionError::Timeout {
                    timeout_secs: timeout.as_secs(),
                })
            }
            Ok(Err(QueryError::Io { reason })) => {
                return Err(ConnectionError::ClientMissing {
                    binary: self.options.ceph_binary.clone(),
                    reason,
                })
            }
            Ok(Err(QueryError::Timeout { .. })) => {
                return Err(ConnectionError::Timeout {
                    timeout_secs: timeout.as_secs(),
                })
            }
            Ok(Err(e)) => {
                return Err(ConnectionError::Unreachable {
                    reason: e.to_string(),
                })
            }
            Ok(Ok(raw)) => raw,
        };

        let fsid = parse_fsid(&raw).ok_or_else(|| ConnectionError::Unreachable {
            reason: "probe returned no fsid".to_string(),
        })?;
        info!("Connected to Ceph cluster {}", fsid);

        Ok(Session { plane, fsid })
    }

    async fn check_readable(&self, path: &Path) -> Result<(), ConnectionError> {
        tokio::fs::File::open(path)
            .await
            .map(|_| ())
            .map_err(|source| ConnectionError::ConfigUnreadable {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Accepts both `{"fsid": "..."}` and a bare string.
fn parse_fsid(raw: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(raw).ok()?;
    let fsid = match value {
        Value::String(s) => s,
        Value::Object(map) => map.get("fsid")?.as_str()?.to_string(),
        _ => return None,
    };
    if fsid.is_empty() {
        None
    } else {
        Some(fsid)
    }
}
