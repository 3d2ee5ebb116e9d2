//! Catalog retrieval policy: cache-only vs. fresh fetch, fallback to cache on
//! failure, and the cached-catalog status recorded on the report.

use std::sync::Arc;

use super::model::Catalog;
use super::source::{CatalogRequest, CatalogSource, Facts};
use crate::capture::RunLog;
use crate::config::FACTS_FORMAT;
use crate::report::{CachedCatalogStatus, Report};

/// Per-run inputs to the retrieval decision tree.
#[derive(Debug, Clone)]
pub struct RetrieveOptions<'a> {
    pub node_name: &'a str,
    /// The node's last-known environment. A cache hit from a different
    /// environment is rejected on the fallback path and merely noted on the
    /// cache-only path.
    pub environment: &'a str,
    pub use_cached_catalog: bool,
    pub use_cache_on_failure: bool,
    pub noop: bool,
    pub checksum_types: &'a [String],
    pub transaction_uuid: &'a str,
    pub job_id: Option<&'a str>,
}

/// Implements the cache/fresh/fallback decision tree of the retrieval stage.
///
/// Strict-environment enforcement deliberately does not live here: the
/// orchestrator applies it after retrieval so the same rejection rule covers
/// fresh and cached results alike.
pub struct CatalogRetriever {
    source: Arc<dyn CatalogSource>,
    log: RunLog,
}

impl CatalogRetriever {
    pub fn new(source: Arc<dyn CatalogSource>, log: RunLog) -> Self {
        Self { source, log }
    }

    /// Obtain a catalog per the configured policy, recording the
    /// cached-catalog status on the report. The first status recorded for a
    /// run wins; re-retrievals cannot overwrite it.
    pub async fn retrieve(
        &self,
        facts: Option<Facts>,
        opts: &RetrieveOptions<'_>,
        report: &mut Report,
    ) -> Option<Catalog> {
        if opts.use_cached_catalog {
            if let Some(catalog) = self.find_cached(opts).await {
                if catalog.environment != opts.environment {
                    self.log.notice(format!(
                        "Using cached catalog from environment '{}'",
                        catalog.environment
                    ));
                }
                report.set_cached_catalog_status(CachedCatalogStatus::ExplicitlyRequested);
                return Some(catalog);
            }
            // No cached catalog; fall through to a fresh fetch.
        }

        self.retrieve_new(facts, opts, report).await
    }

    async fn retrieve_new(
        &self,
        facts: Option<Facts>,
        opts: &RetrieveOptions<'_>,
        report: &mut Report,
    ) -> Option<Catalog> {
        let (facts, facts_format) = if self.source.supports_fact_upload() {
            (facts, Some(FACTS_FORMAT.to_string()))
        } else {
            (None, None)
        };

        let request = CatalogRequest {
            environment: opts.environment.to_string(),
            ignore_cache: true,
            ignore_terminus: false,
            // Noop runs must not overwrite the cache with a catalog that was
            // never enforced.
            ignore_cache_save: opts.noop,
            facts,
            facts_format,
            static_catalog: true,
            checksum_type: opts.checksum_types.to_vec(),
            transaction_uuid: opts.transaction_uuid.to_string(),
            job_id: opts.job_id.map(str::to_string),
        };

        match self.source.find(opts.node_name, request).await {
            Ok(Some(catalog)) => {
                report.set_cached_catalog_status(CachedCatalogStatus::NotUsed);
                Some(catalog)
            }
            Ok(None) => {
                self.log
                    .warning("Could not retrieve catalog from remote server: not found");
                self.fall_back_to_cache(opts, report).await
            }
            Err(error) => {
                self.log.warning(format!(
                    "Could not retrieve catalog from remote server: {error:#}"
                ));
                self.fall_back_to_cache(opts, report).await
            }
        }
    }

    async fn fall_back_to_cache(
        &self,
        opts: &RetrieveOptions<'_>,
        report: &mut Report,
    ) -> Option<Catalog> {
        if !opts.use_cache_on_failure {
            self.log
                .warning("Not using cache on failed catalog retrieval");
            report.set_cached_catalog_status(CachedCatalogStatus::NotUsed);
            return None;
        }

        match self.find_cached(opts).await {
            Some(catalog) if catalog.environment != opts.environment => {
                self.log.err(format!(
                    "Not using cached catalog because its environment '{}' does not match '{}'",
                    catalog.environment, opts.environment
                ));
                report.set_cached_catalog_status(CachedCatalogStatus::NotUsed);
                None
            }
            Some(catalog) => {
                self.log.notice(format!(
                    "Using cached catalog from environment '{}'",
                    catalog.environment
                ));
                report.set_cached_catalog_status(CachedCatalogStatus::OnFailure);
                Some(catalog)
            }
            None => {
                report.set_cached_catalog_status(CachedCatalogStatus::NotUsed);
                None
            }
        }
    }

    /// Ask the source for the cached catalog only, never the network.
    async fn find_cached(&self, opts: &RetrieveOptions<'_>) -> Option<Catalog> {
        let request = CatalogRequest {
            environment: opts.environment.to_string(),
            ignore_terminus: true,
            transaction_uuid: opts.transaction_uuid.to_string(),
            job_id: opts.job_id.map(str::to_string),
            ..CatalogRequest::default()
        };

        match self.source.find(opts.node_name, request).await {
            Ok(found) => found,
            Err(error) => {
                self.log
                    .warning(format!("Could not read cached catalog: {error:#}"));
                None
            }
        }
    }
}
