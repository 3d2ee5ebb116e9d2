pub mod model;
pub mod retriever;
pub mod source;

pub use model::{ApplyableCatalog, Catalog, Resource};
pub use retriever::{CatalogRetriever, RetrieveOptions};
pub use source::{
    ApplyOptions, CatalogApplier, CatalogRequest, CatalogSource, FactSource, Facts, NodeData,
    NodeRequest, NodeSource, PluginSync,
};
