//! Report dispatch: operator summary, durable last-run summary file, and
//! submission to the report store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, error};

use super::model::{RawSummary, Report};
use crate::settings::Settings;

/// Remote report persistence collaborator.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: &Report) -> Result<()>;
}

/// Owns the end-of-run report handling.
pub struct ReportManager {
    store: Arc<dyn ReportStore>,
    report_enabled: bool,
    summarize: bool,
    summary_path: PathBuf,
    summary_mode: String,
}

impl ReportManager {
    pub fn new(settings: &Settings, store: Arc<dyn ReportStore>) -> Self {
        Self {
            store,
            report_enabled: settings.report,
            summarize: settings.summarize,
            summary_path: settings.last_run_summary_path.clone(),
            summary_mode: settings.last_run_summary_mode.clone(),
        }
    }

    /// Dispatch a finalized report.
    ///
    /// The local summary file is always written; remote persistence failures
    /// are logged and never propagated, so a report-save failure cannot mask
    /// the run's actual result.
    pub async fn dispatch(&self, report: &Report) {
        if self.summarize {
            print!("{}", report.summary());
        }

        self.write_last_run_summary(report);

        if self.report_enabled {
            if let Err(error) = self.store.save(report).await {
                error!(%error, "could not save report to the report store");
            }
        }
    }

    /// Write the last-run summary via an atomic replace: the serialized
    /// summary lands in a temp file that is renamed over the target, so no
    /// partial file is ever visible. Write failures are logged and swallowed.
    pub fn write_last_run_summary(&self, report: &Report) {
        if let Err(error) = self.try_write_summary(&report.raw_summary()) {
            error!(
                path = %self.summary_path.display(),
                %error,
                "could not write last-run summary file"
            );
        }
    }

    fn try_write_summary(&self, summary: &RawSummary) -> Result<()> {
        let yaml = serde_yaml::to_string(summary).context("failed to serialize run summary")?;

        let dir = self
            .summary_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = NamedTempFile::new_in(dir)
            .context("failed to create temp file for run summary")?;
        temp.write_all(yaml.as_bytes())
            .context("failed to write run summary")?;
        temp.flush().context("failed to flush run summary")?;

        match parse_file_mode(&self.summary_mode) {
            Some(mode) => apply_file_mode(temp.path(), mode),
            None => {
                // Invalid mode only skips the chmod; the write still happens.
                error!(
                    mode = %self.summary_mode,
                    path = %self.summary_path.display(),
                    "invalid permission mode for last-run summary file, leaving default mode"
                );
            }
        }

        temp.persist(&self.summary_path)
            .context("failed to replace last-run summary file")?;

        debug!(path = %self.summary_path.display(), "wrote last-run summary");
        Ok(())
    }
}

/// Parse an octal mode string like "0640". Returns `None` for anything that
/// is not a legal permission value.
pub fn parse_file_mode(mode: &str) -> Option<u32> {
    let parsed = u32::from_str_radix(mode, 8).ok()?;
    (parsed <= 0o7777).then_some(parsed)
}

#[cfg(unix)]
fn apply_file_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(error) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)) {
        error!(path = %path.display(), %error, "could not apply mode to summary file");
    }
}

#[cfg(not(unix))]
fn apply_file_mode(_path: &Path, _mode: u32) {}
