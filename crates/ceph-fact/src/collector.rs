//! One collection run from configuration to exit status.

use crate::aggregator::{Aggregator, RunReport};
use crate::catalog::Catalog;
use crate::config::FactsConfig;
use crate::emitter;
use crate::error::{FactsError, Result};
use crate::policy::EXIT_FATAL;
use crate::session::{Connector, ControlPlane, Session};
use std::io::Write;
use std::sync::Arc;
use tracing::error;

/// Validated configuration plus the catalog it selects.
#[derive(Debug)]
pub struct Collector {
    config: FactsConfig,
    catalog: Catalog,
}

impl Collector {
    /// Validates `config` and builds the catalog. Nothing touches the cluster.
    pub fn new(config: FactsConfig) -> Result<Self> {
        config.validate()?;
        let catalog = Catalog::standard(&config.catalog_options()?)?.without(&config.skip)?;
        Ok(Self { config, catalog })
    }

    /// The queries this collector will run.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The effective configuration.
    pub fn config(&self) -> &FactsConfig {
        &self.config
    }

    fn aggregator(&self) -> Aggregator {
        Aggregator::new(self.config.timeout(), self.config.concurrency)
    }

    fn connector(&self) -> Connector {
        Connector::new(self.config.connect_options())
    }

    async fn gather(&self, session: Session) -> RunReport {
        let report = self.aggregator().run(&session, &self.catalog).await;
        session.close().await;
        report
    }

    /// Connects through the `ceph` client and runs the catalog.
    pub async fn collect(&self) -> Result<RunReport> {
        let session = self.connector().open().await?;
        Ok(self.gather(session).await)
    }

    /// Same as [`collect`](Self::collect) over an arbitrary control plane.
    pub async fn collect_with(&self, plane: Arc<dyn ControlPlane>) -> Result<RunReport> {
        let session = self.connector().open_with(plane).await?;
        Ok(self.gather(session).await)
    }

    /// Full run: collect, write the document to `out`, return the exit status.
    pub async fn execute<W: Write>(&self, out: W) -> u8 {
        let result = self.collect().await;
        self.finish(result, out)
    }

    /// [`execute`](Self::execute) over an arbitrary control plane.
    pub async fn execute_with<W: Write>(&self, plane: Arc<dyn ControlPlane>, out: W) -> u8 {
        let result = self.collect_with(plane).await;
        self.finish(result, out)
    }

    fn finish<W: Write>(&self, result: Result<RunReport>, out: W) -> u8 {
        let report = match result {
            Ok(report) => report,
            Err(e) => return fatal(e),
        };
        if let Err(e) = emitter::emit(report.document(), out) {
            return fatal(e);
        }
        self.config.exit_policy.exit_code(&report)
    }
}

fn fatal(e: FactsError) -> u8 {
    error!("{}", e);
    EXIT_FATAL
}
