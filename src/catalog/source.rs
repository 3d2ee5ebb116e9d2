//! Collaborator contracts consumed by the run pipeline.
//!
//! The core never performs catalog/node/fact I/O itself; it drives these
//! narrow trait objects and makes decisions from the results.

use anyhow::Result;
use async_trait::async_trait;

use super::model::{ApplyableCatalog, Catalog};
use crate::report::Report;

/// Facts document uploaded with fresh-catalog requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Facts {
    pub name: String,
    pub values: serde_json::Value,
}

/// Options for one catalog lookup.
#[derive(Debug, Clone, Default)]
pub struct CatalogRequest {
    /// The environment the catalog is requested under.
    pub environment: String,
    /// Bypass the local cache and go to the source.
    pub ignore_cache: bool,
    /// Never contact the source; answer from the local cache only.
    pub ignore_terminus: bool,
    /// Do not persist a freshly fetched catalog into the cache.
    pub ignore_cache_save: bool,
    pub facts: Option<Facts>,
    pub facts_format: Option<String>,
    pub static_catalog: bool,
    pub checksum_type: Vec<String>,
    pub transaction_uuid: String,
    pub job_id: Option<String>,
}

/// Catalog source: remote service and local cache behind one interface.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Whether this source accepts uploaded facts with the request. A local
    /// source compiles from disk and has no use for an upload; the capability
    /// flag replaces any inspection of the source's concrete type.
    fn supports_fact_upload(&self) -> bool;

    /// `Ok(None)` means not found; `Err` means the lookup itself failed.
    async fn find(&self, node_name: &str, request: CatalogRequest) -> Result<Option<Catalog>>;
}

/// Options for one node lookup.
#[derive(Debug, Clone, Default)]
pub struct NodeRequest {
    pub transaction_uuid: String,
    /// Only sent when the operator pinned an environment explicitly.
    pub configured_environment: Option<String>,
}

/// Classification data for the local node.
#[derive(Debug, Clone, Default)]
pub struct NodeData {
    pub environment: Option<String>,
    pub classes: Vec<String>,
    pub parameters: serde_json::Value,
}

#[async_trait]
pub trait NodeSource: Send + Sync {
    async fn find(&self, node_name: &str, request: NodeRequest) -> Result<Option<NodeData>>;
}

/// Fact collection stays external; the pipeline only needs the document.
#[async_trait]
pub trait FactSource: Send + Sync {
    async fn facts(&self, node_name: &str) -> Result<Facts>;
}

/// Caller-supplied options forwarded to the applier. The pipeline adds the
/// noop flag when the run is a noop run.
pub type ApplyOptions = serde_json::Map<String, serde_json::Value>;

/// The resource-graph execution engine. Applies an already-materialized
/// catalog and returns the stage exit status.
#[async_trait]
pub trait CatalogApplier: Send + Sync {
    async fn apply(
        &self,
        catalog: &ApplyableCatalog,
        options: &ApplyOptions,
        report: &mut Report,
    ) -> Result<i32>;
}

/// Plugin/code synchronization collaborator, invoked best-effort.
#[async_trait]
pub trait PluginSync: Send + Sync {
    async fn sync(&self) -> Result<()>;
}
