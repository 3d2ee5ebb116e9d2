pub mod manager;
pub mod model;

pub use manager::{ReportManager, ReportStore};
pub use model::{CachedCatalogStatus, LogEntry, RawSummary, Report};
