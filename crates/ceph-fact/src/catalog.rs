//! The query catalog: every fact the collector gathers, where it lands in the
//! document and how it is obtained.
//!
//! Adding a fact means adding one [`QuerySpec`] to [`Catalog::standard`]; the
//! aggregator knows nothing about individual queries.

use crate::device;
use crate::document::KeyPath;
use crate::error::{CatalogError, ConfigError, DocumentError, QueryError};
use crate::redact::Redactor;
use crate::session::{MonCommand, Session};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Log target of the gathered config dump; `--log-gathered-config` enables it.
pub const GATHERED_CONFIG_TARGET: &str = "ceph_fact::gathered_config";

/// Bounds applied to the commands one entry issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Timeout of each single command.
    pub command_timeout: Duration,
    /// Commands an entry may keep in flight itself (device metrics).
    pub in_flight: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(10),
            in_flight: 1,
        }
    }
}

/// JSON shape a query is expected to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
    /// Anything that parses.
    Any,
}

impl Shape {
    fn check(self, value: &Value) -> Result<(), QueryError> {
        let ok = match self {
            Shape::Object => value.is_object(),
            Shape::Array => value.is_array(),
            Shape::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(QueryError::MalformedResponse {
                reason: format!("expected {:?}, got {}", self, type_name(value)),
            })
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// How a query talks to the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// One command.
    Command(MonCommand),
    /// Commands tried in order until one answers; for commands renamed
    /// between releases.
    FirstOf(Vec<MonCommand>),
    /// Device list plus per-device health metrics.
    DeviceHealth,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Command(cmd) => write!(f, "{}", cmd),
            Invocation::FirstOf(cmds) => {
                let words: Vec<String> = cmds.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", words.join(" | "))
            }
            Invocation::DeviceHealth => write!(f, "device ls + device get-health-metrics"),
        }
    }
}

/// Step applied to a successful payload before it enters the document.
#[derive(Debug, Clone)]
pub enum PostProcess {
    /// Stored as returned.
    None,
    /// `config dump` redaction; optionally logs the result.
    Redact {
        /// Compiled filters
        redactor: Arc<Redactor>,
        /// Log the redacted dump at info level
        log_result: bool,
    },
}

/// One catalog entry.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    name: String,
    path: KeyPath,
    invocation: Invocation,
    shape: Shape,
    post: PostProcess,
    on_empty: Option<Value>,
}

impl QuerySpec {
    /// An entry running a single command.
    pub fn command(name: &str, path: &str, cmd: MonCommand, shape: Shape) -> Result<Self, DocumentError> {
        Self::new(name, path, Invocation::Command(cmd), shape)
    }

    /// An entry with any invocation.
    pub fn new(name: &str, path: &str, invocation: Invocation, shape: Shape) -> Result<Self, DocumentError> {
        Ok(Self {
            name: name.to_string(),
            path: KeyPath::parse(path)?,
            invocation,
            shape,
            post: PostProcess::None,
            on_empty: None,
        })
    }

    /// Attaches a post-processing step.
    pub fn with_post(mut self, post: PostProcess) -> Self {
        self.post = post;
        self
    }

    /// Stores `value` when the command answers with nothing at all. For
    /// commands that print no JSON when there is nothing to report.
    pub fn empty_as(mut self, value: Value) -> Self {
        self.on_empty = Some(value);
        self
    }

    /// Stable query name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the result lands.
    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    /// How the result is obtained.
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Runs the query and returns the value to store. Every command it
    /// issues is bounded by `limits.command_timeout` on its own.
    pub async fn invoke(&self, session: &Session, limits: &Limits) -> Result<Value, QueryError> {
        let timeout = limits.command_timeout;
        let result = match &self.invocation {
            Invocation::Command(cmd) => run_command(session, cmd, timeout).await,
            Invocation::FirstOf(cmds) => run_first_of(session, cmds, timeout).await,
            Invocation::DeviceHealth => device::collect(session, limits).await,
        };
        let value = match (result, &self.on_empty) {
            (Err(QueryError::EmptyResponse), Some(empty)) => {
                debug!("{} answered with nothing, storing {}", self.name, empty);
                empty.clone()
            }
            (result, _) => result?,
        };
        self.shape.check(&value)?;

        match &self.post {
            PostProcess::None => Ok(value),
            PostProcess::Redact {
                redactor,
                log_result,
            } => {
                let value = redactor.redact_config(value);
                if *log_result {
                    info!(
                        target: GATHERED_CONFIG_TARGET,
                        "Gathered config for {}: {}", self.path, value
                    );
                }
                Ok(value)
            }
        }
    }
}

/// Decodes a command payload. Blank output counts as no answer.
pub fn parse_payload(raw: &[u8]) -> Result<Value, QueryError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(QueryError::EmptyResponse);
    }
    serde_json::from_slice(raw).map_err(|e| QueryError::MalformedResponse {
        reason: e.to_string(),
    })
}

/// Runs one command under its own timeout and decodes the answer.
pub async fn run_command(
    session: &Session,
    cmd: &MonCommand,
    timeout: Duration,
) -> Result<Value, QueryError> {
    match tokio::time::timeout(timeout, session.mon_command(cmd)).await {
        Ok(raw) => parse_payload(&raw?),
        Err(_) => Err(QueryError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

async fn run_first_of(
    session: &Session,
    cmds: &[MonCommand],
    timeout: Duration,
) -> Result<Value, QueryError> {
    let mut last_err = QueryError::Unsupported {
        reason: "no command to try".to_string(),
    };
    for cmd in cmds {
        match run_command(session, cmd, timeout).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!("'{}' failed ({}), trying next form", cmd, e);
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// Knobs that change which entries the standard catalog holds.
#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    /// Add the device-health entry.
    pub device_health: bool,
    /// Filters for the config dump.
    pub redactor: Arc<Redactor>,
    /// Log the redacted config dump.
    pub log_config: bool,
}

/// Ordered, validated set of queries.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<QuerySpec>,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicate names and overlapping paths.
    pub fn new(entries: Vec<QuerySpec>) -> Result<Self, CatalogError> {
        let mut names = HashSet::new();
        for (i, entry) in entries.iter().enumerate() {
            if !names.insert(entry.name.as_str()) {
                return Err(CatalogError::DuplicateName(entry.name.clone()));
            }
            if let Some(other) = entries[..i].iter().find(|e| e.path.overlaps(&entry.path)) {
                return Err(CatalogError::OverlappingPaths {
                    first: other.name.clone(),
                    second: entry.name.clone(),
                });
            }
        }
        Ok(Self { entries })
    }

    /// The facts gathered by default.
    pub fn standard(options: &CatalogOptions) -> crate::error::Result<Self> {
        use Shape::{Any, Array, Object};

        let cmd = MonCommand::new;
        let mut entries = vec![
            QuerySpec::command("status", "status", cmd("status"), Object)?,
            QuerySpec::command("fsid", "fsid", cmd("fsid"), Object)?,
            QuerySpec::command("versions", "versions", cmd("versions"), Object)?,
            QuerySpec::command("features", "features", cmd("features"), Object)?,
            QuerySpec::command("config-dump", "config", cmd("config dump"), Array)?.with_post(
                PostProcess::Redact {
                    redactor: options.redactor.clone(),
                    log_result: options.log_config,
                },
            ),
            QuerySpec::command("health", "health.stat", cmd("health"), Object)?,
            QuerySpec::command(
                "health-detail",
                "health.detail",
                cmd("health").arg("detail", "detail"),
                Object,
            )?,
            QuerySpec::command("df", "df", cmd("df"), Object)?,
            QuerySpec::command("mon-stat", "mon.stat", cmd("mon stat"), Object)?,
            QuerySpec::command("mon-dump", "mon.dump", cmd("mon dump"), Object)?,
            QuerySpec::command("mon-metadata", "mon.metadata", cmd("mon metadata"), Array)?,
            QuerySpec::command("manager-metadata", "mgr_metadata", cmd("mgr metadata"), Array)?,
            QuerySpec::command("manager-status", "mgr_stat", cmd("mgr stat"), Object)?,
            QuerySpec::command("osd-tree", "osd.tree", cmd("osd tree"), Object)?,
            QuerySpec::command("osd-df", "osd.df", cmd("osd df"), Object)?,
            QuerySpec::command("osd-dump", "osd.dump", cmd("osd dump"), Object)?,
            QuerySpec::command("osd-stat", "osd.stat", cmd("osd stat"), Object)?,
            QuerySpec::command("osd-metadata", "osd_metadata", cmd("osd metadata"), Array)?,
            QuerySpec::command("osd-perf", "osd.perf", cmd("osd perf"), Any)?,
            QuerySpec::command("pg-stat", "pg.stat", cmd("pg stat"), Object)?,
            QuerySpec::command(
                "pg-dump-summary",
                "pg.summary",
                cmd("pg dump").arg("dumpcontents", "summary"),
                Object,
            )?,
            QuerySpec::command("pg-dump-stuck", "pg.stuck", cmd("pg dump_stuck"), Any)?
                .empty_as(Value::Array(Vec::new())),
            QuerySpec::command("mds-metadata", "mds.metadata", cmd("mds metadata"), Array)?,
            QuerySpec::command("mds-stat", "mds.stat", cmd("mds stat"), Any)?,
            QuerySpec::new(
                "fs-dump",
                "mds.dump",
                Invocation::FirstOf(vec![cmd("fs dump"), cmd("mds dump")]),
                Object,
            )?,
            QuerySpec::command("fs-status", "mds.status", cmd("fs status"), Any)?,
        ];
        if options.device_health {
            entries.push(QuerySpec::new(
                "device-health",
                "device.status",
                Invocation::DeviceHealth,
                Array,
            )?);
        }
        Ok(Self::new(entries)?)
    }

    /// A copy without the named entries. Unknown names are an error so a
    /// typo does not silently keep a query.
    pub fn without(&self, names: &[String]) -> Result<Self, ConfigError> {
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(ConfigError::UnknownQuery(unknown.clone()));
        }
        let entries = self
            .entries
            .iter()
            .filter(|e| !names.iter().any(|n| n == &e.name))
            .cloned()
            .collect();
        Ok(Self { entries })
    }

    /// Entry by name.
    pub fn get(&self, name: &str) -> Option<&QuerySpec> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &QuerySpec> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing would be queried.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One line per entry: name, key path, command.
    pub fn describe(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{:<18} {:<20} {}\n", e.name, e.path.to_string(), e.invocation))
            .collect()
    }
}
