//! Runs the catalog against a session and assembles the fact document.

use crate::catalog::{Catalog, Limits, QuerySpec};
use crate::document::{FactDocument, KeyPath};
use crate::error::QueryError;
use crate::session::Session;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default number of queries in flight.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// What happened to one query in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// Query name.
    pub name: String,
    /// Target key path.
    pub path: KeyPath,
    /// Wall time spent on the query.
    pub elapsed: Duration,
    /// `Ok` when the value was merged into the document.
    pub result: Result<(), QueryError>,
}

impl QueryOutcome {
    /// True if the value made it into the document.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&QueryError> {
        self.result.as_ref().err()
    }
}

/// Best-effort document plus the fate of every query, in catalog order.
#[derive(Debug, Clone)]
pub struct RunReport {
    document: FactDocument,
    outcomes: Vec<QueryOutcome>,
}

impl RunReport {
    /// The assembled facts.
    pub fn document(&self) -> &FactDocument {
        &self.document
    }

    /// Every outcome, in catalog order.
    pub fn outcomes(&self) -> &[QueryOutcome] {
        &self.outcomes
    }

    /// Outcome of the named query, if it was part of the run.
    pub fn outcome(&self, name: &str) -> Option<&QueryOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// True if the named query ran and succeeded.
    pub fn succeeded(&self, name: &str) -> bool {
        self.outcome(name).map(QueryOutcome::is_success).unwrap_or(false)
    }

    /// Failed queries only.
    pub fn failures(&self) -> Vec<&QueryOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    /// True if no query failed.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(QueryOutcome::is_success)
    }

    /// Splits the report into its parts.
    pub fn into_parts(self) -> (FactDocument, Vec<QueryOutcome>) {
        (self.document, self.outcomes)
    }
}

/// Executes catalog entries with a per-query timeout and bounded concurrency.
#[derive(Debug, Clone)]
pub struct Aggregator {
    query_timeout: Duration,
    concurrency: usize,
}

impl Aggregator {
    /// `concurrency` below one is treated as one.
    pub fn new(query_timeout: Duration, concurrency: usize) -> Self {
        Self {
            query_timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Queries allowed in flight against `session`.
    pub fn effective_concurrency(&self, session: &Session) -> usize {
        if session.supports_concurrency() {
            self.concurrency
        } else {
            1
        }
    }

    async fn run_one(
        &self,
        spec: &QuerySpec,
        session: &Session,
        limits: &Limits,
    ) -> (Duration, Result<Value, QueryError>) {
        let start = Instant::now();
        let result = spec.invoke(session, limits).await;
        (start.elapsed(), result)
    }

    /// Attempts every entry once, each command under the query timeout. A
    /// failing entry leaves its key path absent and never stops the others;
    /// merging happens in catalog order whatever order the queries finish in.
    pub async fn run(&self, session: &Session, catalog: &Catalog) -> RunReport {
        let in_flight = self.effective_concurrency(session);
        let limits = Limits {
            command_timeout: self.query_timeout,
            in_flight,
        };
        let limits = &limits;
        info!(
            "Gathering {} queries from cluster {} ({} in flight)",
            catalog.len(),
            session.fsid(),
            in_flight
        );

        let results: Vec<(&QuerySpec, Duration, Result<Value, QueryError>)> =
            stream::iter(catalog.iter())
                .map(move |spec| async move {
                    let (elapsed, result) = self.run_one(spec, session, limits).await;
                    (spec, elapsed, result)
                })
                .buffered(in_flight)
                .collect()
                .await;

        let mut document = FactDocument::new();
        let mut outcomes = Vec::with_capacity(results.len());

        for (spec, elapsed, result) in results {
            let result = match result {
                Ok(value) => document.insert(spec.path(), value).map_err(|e| {
                    error!("Cannot place {}: {}", spec.name(), e);
                    QueryError::MalformedResponse {
                        reason: e.to_string(),
                    }
                }),
                Err(e) => Err(e),
            };

            match &result {
                Ok(()) => debug!(
                    "Collected {} into {} in {}ms",
                    spec.name(),
                    spec.path(),
                    elapsed.as_millis()
                ),
                Err(e) => warn!(
                    "Query {} failed after {}ms ({}): {}",
                    spec.name(),
                    elapsed.as_millis(),
                    e.kind(),
                    e
                ),
            }

            outcomes.push(QueryOutcome {
                name: spec.name().to_string(),
                path: spec.path().clone(),
                elapsed,
                result,
            });
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            "Collected {} of {} facts ({} failed)",
            outcomes.len() - failed,
            outcomes.len(),
            failed
        );

        RunReport { document, outcomes }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), DEFAULT_CONCURRENCY)
    }
}
