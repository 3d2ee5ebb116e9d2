//! High-level run pipeline for the configuration agent.
//!
//! This module provides the orchestrator that drives one convergence run end
//! to end: server failover, node lookup, catalog retrieval, conversion, hook
//! execution, catalog application, and report finalization.
//!
//! This is the primary API for external users and for the CLI layer.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::capture::RunLog;
use crate::catalog::{
    ApplyOptions, ApplyableCatalog, Catalog, CatalogApplier, CatalogRetriever, CatalogSource,
    FactSource, Facts, NodeRequest, NodeSource, PluginSync, RetrieveOptions,
};
use crate::config::ENVIRONMENT_SWITCH_RETRY_LIMIT;
use crate::exec::{split_command_line, CommandRunner};
use crate::failover::{ServerSelector, StatusProbe};
use crate::report::{Report, ReportManager, ReportStore};
use crate::settings::{ServerBinding, Settings, SharedServerBinding};

/// Caller-supplied overrides for one run. Immutable for the run's duration.
#[derive(Default)]
pub struct RunOptions {
    /// A pre-supplied catalog; skips failover, node lookup, and retrieval.
    pub catalog: Option<Catalog>,
    /// A pre-supplied report to accumulate into instead of a fresh one.
    pub report: Option<Report>,
    /// Synchronize plugins/code before retrieving the catalog.
    pub pluginsync: bool,
    /// Job identifier assigned by the central service, if this run was
    /// orchestrated remotely.
    pub job_id: Option<String>,
    /// Passed through to the applier; noop mode adds its flag to the map
    /// before the call.
    pub apply_options: ApplyOptions,
}

/// The external collaborators the pipeline drives.
pub struct Collaborators {
    pub catalog_source: Arc<dyn CatalogSource>,
    pub node_source: Arc<dyn NodeSource>,
    pub fact_source: Arc<dyn FactSource>,
    pub applier: Arc<dyn CatalogApplier>,
    pub plugin_sync: Arc<dyn PluginSync>,
    pub command_runner: Arc<dyn CommandRunner>,
    pub report_store: Arc<dyn ReportStore>,
    pub probe: Arc<dyn StatusProbe>,
}

/// Drives one run as a single sequential pipeline.
pub struct Configurer {
    settings: Settings,
    binding: SharedServerBinding,
    collaborators: Collaborators,
    report_manager: ReportManager,
}

impl Configurer {
    pub fn new(settings: Settings, collaborators: Collaborators) -> Self {
        let binding = ServerBinding::shared(settings.server.clone(), settings.server_port);
        let report_manager =
            ReportManager::new(&settings, Arc::clone(&collaborators.report_store));
        Self {
            settings,
            binding,
            collaborators,
            report_manager,
        }
    }

    /// The server/port the run is currently bound to. Overridden for the
    /// run's duration when failover selects a different endpoint.
    pub fn server_binding(&self) -> SharedServerBinding {
        Arc::clone(&self.binding)
    }

    /// Execute one convergence run.
    ///
    /// Returns the apply stage's exit status when the catalog was applied,
    /// `None` when the run was skipped (no catalog, strict-environment
    /// rejection, failed pre-run hook, apply failure), and an error only for
    /// the fatal no-functional-server case. Exactly one report is finalized
    /// and dispatched on every path.
    pub async fn run(&self, options: RunOptions) -> Result<Option<i32>> {
        let start = Instant::now();
        let log = RunLog::new();
        let RunOptions {
            catalog,
            report,
            pluginsync,
            job_id,
            apply_options,
        } = options;

        // 1. Resolve the report and attach the capture target.
        let mut report = match report {
            Some(report) => report,
            None => Report::new(
                self.settings.node_name.clone(),
                self.settings.environment.clone(),
                Uuid::new_v4().to_string(),
                job_id,
                self.settings.noop,
            ),
        };

        let result = self
            .run_internal(catalog, pluginsync, &apply_options, &log, &mut report)
            .await;

        // Detach the capture target and finalize, unconditionally: every run
        // produces exactly one finalized, dispatched report.
        for entry in log.drain() {
            report.add_log(entry.level, entry.message);
        }
        report.finalize(start.elapsed().as_secs_f64());
        self.report_manager.dispatch(&report).await;

        result
    }

    async fn run_internal(
        &self,
        supplied_catalog: Option<Catalog>,
        pluginsync: bool,
        apply_options: &ApplyOptions,
        log: &RunLog,
        report: &mut Report,
    ) -> Result<Option<i32>> {
        let transaction_uuid = report.transaction_uuid.clone();
        let mut environment = self.settings.environment.clone();

        // 2. Failover: commit to one functional server for the whole run.
        // Failure here is the one fault that aborts the run.
        let _server_guard = if supplied_catalog.is_none() && !self.settings.server_list.is_empty()
        {
            let selector = ServerSelector::new(Arc::clone(&self.collaborators.probe));
            let endpoint = selector.select(&self.settings.server_list).await?;
            log.debug(format!("Selected functional server {endpoint}"));
            report.master_used = Some(endpoint.to_string());
            Some(ServerBinding::scoped_override(&self.binding, &endpoint))
        } else {
            None
        };

        // 3. Plugin sync, best-effort, never in cache-only mode.
        if pluginsync && !self.settings.use_cached_catalog {
            if let Err(error) = self.collaborators.plugin_sync.sync().await {
                log.warning(format!("Could not synchronize plugins: {error:#}"));
            }
        }

        // 4. Node lookup. Recovered: the run proceeds with no node data.
        if supplied_catalog.is_none() && !self.settings.use_cached_catalog {
            let request = NodeRequest {
                transaction_uuid: transaction_uuid.clone(),
                configured_environment: self.settings.configured_environment.clone(),
            };
            match self
                .collaborators
                .node_source
                .find(&self.settings.node_name, request)
                .await
            {
                Ok(Some(node)) => {
                    if let Some(node_environment) = node.environment {
                        if node_environment != environment {
                            log.notice(format!(
                                "Local environment: '{environment}' doesn't match server specified node environment '{node_environment}', switching agent to '{node_environment}'"
                            ));
                            environment = node_environment;
                            report.environment = environment.clone();
                        }
                    }
                }
                Ok(None) => {
                    log.debug("No node data found, using local configuration");
                }
                Err(error) => {
                    log.warning(format!(
                        "Unable to fetch my node definition, but the agent run will continue: {error:#}"
                    ));
                }
            }
        }

        // 5. Obtain a catalog.
        let retrieval_start = Instant::now();
        let facts = if supplied_catalog.is_none() && !self.settings.use_cached_catalog {
            self.gather_facts(log, report).await
        } else {
            None
        };

        let retriever = CatalogRetriever::new(
            Arc::clone(&self.collaborators.catalog_source),
            log.clone(),
        );

        let mut catalog = match supplied_catalog {
            Some(catalog) => catalog,
            None => {
                match self
                    .retrieve_catalog(&retriever, facts.clone(), &environment, report)
                    .await
                {
                    Some(catalog) => catalog,
                    None => {
                        log.err("Could not retrieve catalog; skipping run");
                        return Ok(None);
                    }
                }
            }
        };

        // 6. Environment reconciliation: adopt the catalog's environment and
        // re-request, bounded so two servers disagreeing about the node can
        // never loop the agent forever.
        for _ in 0..ENVIRONMENT_SWITCH_RETRY_LIMIT {
            if catalog.environment == environment {
                break;
            }
            log.notice(format!(
                "Local environment: '{environment}' doesn't match the catalog's environment '{}', restarting the run with environment '{}'",
                catalog.environment, catalog.environment
            ));
            environment = catalog.environment.clone();
            report.environment = environment.clone();

            catalog = match self
                .retrieve_catalog(&retriever, facts.clone(), &environment, report)
                .await
            {
                Some(catalog) => catalog,
                None => {
                    log.err("Could not retrieve catalog; skipping run");
                    return Ok(None);
                }
            };
        }
        if catalog.environment != environment {
            // Retries exhausted; settle on what the server sent.
            environment = catalog.environment.clone();
            report.environment = environment.clone();
        }

        // 7. Strict-environment enforcement, uniform over fresh and cached
        // results. The catalog is never applied on a mismatch.
        if self.settings.strict_environment {
            let enforced = self.settings.enforced_environment();
            if catalog.environment != enforced {
                log.err(format!(
                    "Not using catalog from environment '{}': strict environment mode is set and the agent is configured for environment '{}'",
                    catalog.environment, enforced
                ));
                return Ok(None);
            }
        }

        report.configuration_version = catalog.configuration_version.clone();

        // 8. Convert to the applyable form, timing the conversion.
        let convert_start = Instant::now();
        let applyable = catalog.convert(retrieval_start.elapsed());
        report.add_time("convert_catalog", convert_start.elapsed().as_secs_f64());
        report.add_time("config_retrieval", retrieval_start.elapsed().as_secs_f64());

        // 9. Pre-run hook: a failure skips application but not the rest of
        // the pipeline.
        let apply_allowed = self.execute_prerun_command(log).await;

        // 10. Apply. Noop rides along in the options so the applier computes
        // changes without persisting them. Exceptions from the applier are
        // recovered into "no result" so the post-run hook and report dispatch
        // still happen.
        let mut exit_status = None;
        if apply_allowed {
            let mut apply_options = apply_options.clone();
            if self.settings.noop {
                apply_options.insert("noop".to_string(), serde_json::Value::Bool(true));
            }
            exit_status = self
                .apply_catalog(&applyable, &apply_options, log, report)
                .await;
        }

        // 11. Post-run hook runs even when the pre-run hook or apply failed.
        self.execute_postrun_command(log).await;

        // 12. The caller sees the exit status only when application ran.
        Ok(exit_status)
    }

    async fn retrieve_catalog(
        &self,
        retriever: &CatalogRetriever,
        facts: Option<Facts>,
        environment: &str,
        report: &mut Report,
    ) -> Option<Catalog> {
        // Cloned so the options do not borrow the report the retriever
        // mutates.
        let transaction_uuid = report.transaction_uuid.clone();
        let job_id = report.job_id.clone();
        let opts = RetrieveOptions {
            node_name: &self.settings.node_name,
            environment,
            use_cached_catalog: self.settings.use_cached_catalog,
            use_cache_on_failure: self.settings.use_cache_on_failure,
            noop: self.settings.noop,
            checksum_types: &self.settings.checksum_types,
            transaction_uuid: &transaction_uuid,
            job_id: job_id.as_deref(),
        };
        retriever.retrieve(facts, &opts, report).await
    }

    async fn gather_facts(&self, log: &RunLog, report: &mut Report) -> Option<Facts> {
        let start = Instant::now();
        match self
            .collaborators
            .fact_source
            .facts(&self.settings.node_name)
            .await
        {
            Ok(facts) => {
                report.add_time("fact_generation", start.elapsed().as_secs_f64());
                Some(facts)
            }
            Err(error) => {
                log.warning(format!(
                    "Could not gather facts, continuing without them: {error:#}"
                ));
                None
            }
        }
    }

    async fn apply_catalog(
        &self,
        catalog: &ApplyableCatalog,
        options: &ApplyOptions,
        log: &RunLog,
        report: &mut Report,
    ) -> Option<i32> {
        let apply_start = Instant::now();
        let outcome = self
            .collaborators
            .applier
            .apply(catalog, options, report)
            .await;
        report.add_time("catalog_application", apply_start.elapsed().as_secs_f64());

        match outcome {
            Ok(status) => {
                report.set_exit_status(status);
                Some(status)
            }
            Err(error) => {
                log.err(format!("Failed to apply catalog: {error:#}"));
                None
            }
        }
    }

    /// Run the configured pre-run hook. `true` means application may proceed.
    pub async fn execute_prerun_command(&self, log: &RunLog) -> bool {
        self.execute_hook("prerun_command", &self.settings.prerun_command, log)
            .await
    }

    /// Run the configured post-run hook. The outcome is logged only; it never
    /// prevents report dispatch.
    pub async fn execute_postrun_command(&self, log: &RunLog) -> bool {
        self.execute_hook("postrun_command", &self.settings.postrun_command, log)
            .await
    }

    async fn execute_hook(&self, name: &str, command: &str, log: &RunLog) -> bool {
        let argv = split_command_line(command);
        if argv.is_empty() {
            return true;
        }

        match self.collaborators.command_runner.execute(&argv).await {
            Ok(()) => true,
            Err(failure) => {
                log.warning(format!("Could not run command from {name}: {failure}"));
                false
            }
        }
    }
}
