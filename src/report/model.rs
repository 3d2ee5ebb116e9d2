//! The run report: captured logs, timing metrics, and terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::TOTAL_TIME_METRIC;

/// How the cached catalog figured into this run.
///
/// Set exactly once by catalog retrieval and never overwritten afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CachedCatalogStatus {
    #[default]
    NotUsed,
    OnFailure,
    ExplicitlyRequested,
}

impl fmt::Display for CachedCatalogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CachedCatalogStatus::NotUsed => "not_used",
            CachedCatalogStatus::OnFailure => "on_failure",
            CachedCatalogStatus::ExplicitlyRequested => "explicitly_requested",
        };
        f.write_str(s)
    }
}

/// One captured log line, in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: String,
    pub message: String,
    pub time: DateTime<Utc>,
}

/// Versions recorded in the durable summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryVersion {
    pub agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

/// The durable, human-diffable structure written to the last-run summary file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSummary {
    pub version: SummaryVersion,
    pub application: SummaryApplication,
    pub time: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryApplication {
    pub environment: String,
    pub cached_catalog_status: CachedCatalogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
}

/// Accumulates everything observed during one run.
///
/// Created at run start (or supplied by the caller), mutated throughout, and
/// finalized exactly once before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub host: String,
    pub environment: String,
    pub transaction_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub noop: bool,
    /// Append-only captured log entries.
    pub logs: Vec<LogEntry>,
    /// Stage name to elapsed seconds; `"total"` is reserved for finalize.
    pub metrics: BTreeMap<String, f64>,
    cached_catalog_status: CachedCatalogStatus,
    #[serde(default)]
    cached_catalog_status_set: bool,
    /// The server this run actually talked to, once failover has settled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_used: Option<String>,
    exit_status: Option<i32>,
    #[serde(default)]
    finalized: bool,
    /// Configuration version reported by the applied catalog, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_version: Option<String>,
}

impl Report {
    pub fn new(
        host: impl Into<String>,
        environment: impl Into<String>,
        transaction_uuid: impl Into<String>,
        job_id: Option<String>,
        noop: bool,
    ) -> Self {
        Self {
            host: host.into(),
            environment: environment.into(),
            transaction_uuid: transaction_uuid.into(),
            job_id,
            start_time: Utc::now(),
            noop,
            logs: Vec::new(),
            metrics: BTreeMap::new(),
            cached_catalog_status: CachedCatalogStatus::NotUsed,
            cached_catalog_status_set: false,
            master_used: None,
            exit_status: None,
            finalized: false,
            configuration_version: None,
        }
    }

    /// Append a captured log entry. Entries keep insertion order.
    pub fn add_log(&mut self, level: impl Into<String>, message: impl Into<String>) {
        self.logs.push(LogEntry {
            level: level.into(),
            message: message.into(),
            time: Utc::now(),
        });
    }

    /// Record elapsed seconds for a named stage.
    pub fn add_time(&mut self, stage: &str, seconds: f64) {
        debug_assert_ne!(stage, TOTAL_TIME_METRIC, "total is set by finalize");
        self.metrics.insert(stage.to_string(), seconds);
    }

    /// Record how the cached catalog was used. The first write wins; later
    /// writes are ignored so the retrieval stage's verdict sticks.
    pub fn set_cached_catalog_status(&mut self, status: CachedCatalogStatus) {
        if !self.cached_catalog_status_set {
            self.cached_catalog_status = status;
            self.cached_catalog_status_set = true;
        }
    }

    pub fn cached_catalog_status(&self) -> CachedCatalogStatus {
        self.cached_catalog_status
    }

    pub fn set_exit_status(&mut self, status: i32) {
        self.exit_status = Some(status);
    }

    /// Terminal exit status; absent until the apply stage has produced one.
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    /// Store the whole-run elapsed time. Idempotent after the first call.
    pub fn finalize(&mut self, total_seconds: f64) {
        if self.finalized {
            return;
        }
        self.metrics
            .insert(TOTAL_TIME_METRIC.to_string(), total_seconds);
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The structure persisted to the last-run summary file.
    pub fn raw_summary(&self) -> RawSummary {
        RawSummary {
            version: SummaryVersion {
                agent: env!("CARGO_PKG_VERSION").to_string(),
                config: self.configuration_version.clone(),
            },
            application: SummaryApplication {
                environment: self.environment.clone(),
                cached_catalog_status: self.cached_catalog_status,
                exit_status: self.exit_status,
            },
            time: self.metrics.clone(),
        }
    }

    /// Operator-facing rendering used when summary printing is enabled.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Environment: {}\n", self.environment));
        out.push_str(&format!(
            "Cached catalog: {}\n",
            self.cached_catalog_status
        ));
        if let Some(server) = &self.master_used {
            out.push_str(&format!("Server: {}\n", server));
        }
        out.push_str("Time:\n");
        for (stage, seconds) in &self.metrics {
            out.push_str(&format!("  {:>12.2}s  {}\n", seconds, stage));
        }
        out.push_str(&format!("Log entries: {}\n", self.logs.len()));
        if let Some(status) = self.exit_status {
            out.push_str(&format!("Exit status: {}\n", status));
        }
        out
    }
}
