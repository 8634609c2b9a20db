#![warn(missing_docs)]

//! ceph-fact: gathers Ceph cluster state (health, quorum, manager and OSD
//! metadata, capacity, placement groups) into one JSON fact document for
//! configuration-management tooling.

pub mod aggregator;
pub mod catalog;
pub mod cli;
pub mod collector;
pub mod config;
pub mod device;
pub mod document;
pub mod emitter;
pub mod error;
pub mod logging;
pub mod policy;
pub mod redact;
pub mod session;

pub use aggregator::{Aggregator, QueryOutcome, RunReport};
pub use catalog::{Catalog, CatalogOptions, Invocation, Limits, QuerySpec, Shape};
pub use collector::Collector;
pub use config::FactsConfig;
pub use document::{FactDocument, KeyPath, ROOT_KEY};
pub use error::{ConnectionError, FactsError, QueryError};
pub use policy::ExitPolicy;
pub use session::{CephCli, ConnectOptions, Connector, ControlPlane, MonCommand, Session};
