//! Agent settings and the run-scoped server override.
//!
//! Settings are loaded by the (external) settings layer and handed to the
//! orchestrator as a plain struct; nothing in this crate mutates them except
//! the active server binding, which failover overrides for the duration of a
//! single run through [`ServerOverrideGuard`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::DEFAULT_SUMMARY_FILE_MODE;
use crate::failover::ServerEndpoint;

/// The server/port the agent's connections are currently bound to.
///
/// Shared behind a mutex so the failover override can be restored from a
/// `Drop` impl on every exit path, success or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBinding {
    pub server: String,
    pub port: u16,
}

/// Shared handle to the active server binding.
pub type SharedServerBinding = Arc<Mutex<ServerBinding>>;

impl ServerBinding {
    pub fn shared(server: impl Into<String>, port: u16) -> SharedServerBinding {
        Arc::new(Mutex::new(ServerBinding {
            server: server.into(),
            port,
        }))
    }

    /// Install `endpoint` as the active binding, returning a guard that
    /// restores the previous binding when dropped.
    pub fn scoped_override(
        binding: &SharedServerBinding,
        endpoint: &ServerEndpoint,
    ) -> ServerOverrideGuard {
        let mut guard = binding.lock().expect("server binding lock poisoned");
        let previous = guard.clone();
        guard.server = endpoint.host.clone();
        guard.port = endpoint.port;
        drop(guard);

        ServerOverrideGuard {
            binding: Arc::clone(binding),
            previous,
        }
    }
}

/// Restores the prior server binding on drop.
///
/// Connection pools keyed on the binding must be re-resolved by collaborators
/// on each call, so restoring the binding is sufficient to undo the override.
#[must_use = "dropping the guard immediately would undo the override"]
pub struct ServerOverrideGuard {
    binding: SharedServerBinding,
    previous: ServerBinding,
}

impl Drop for ServerOverrideGuard {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.binding.lock() {
            *guard = self.previous.clone();
        }
    }
}

/// Agent-wide settings consumed by the run pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Certname-style identifier for this node.
    pub node_name: String,
    /// The environment the agent currently runs under.
    pub environment: String,
    /// An environment the operator pinned explicitly, if any. Strict-mode
    /// enforcement and the node request's `configured_environment` option key
    /// off this value, not the active one.
    pub configured_environment: Option<String>,
    /// The server the agent is bound to before any failover override.
    pub server: String,
    pub server_port: u16,
    /// Ordered failover candidates. Empty means "use the active binding as-is".
    pub server_list: Vec<ServerEndpoint>,
    /// Cache-only mode: restrict catalog retrieval to previously cached data.
    pub use_cached_catalog: bool,
    /// Fall back to the cached catalog when a fresh fetch fails.
    pub use_cache_on_failure: bool,
    /// Noop mode: compute but never persist changes, including cache updates.
    pub noop: bool,
    /// Reject any catalog whose environment differs from the configured one.
    pub strict_environment: bool,
    /// Hook command run before applying the catalog. Empty disables the hook.
    pub prerun_command: String,
    /// Hook command run after the apply stage. Empty disables the hook.
    pub postrun_command: String,
    /// Checksum types advertised with fresh-catalog requests.
    pub checksum_types: Vec<String>,
    /// Path of the local last-run summary file.
    pub last_run_summary_path: PathBuf,
    /// Octal permission mode string for the summary file, e.g. "0640".
    pub last_run_summary_mode: String,
    /// Whether to submit finished reports to the report store.
    pub report: bool,
    /// Whether to print the human-readable summary after each run.
    pub summarize: bool,
}

impl Settings {
    /// The environment strict mode compares catalogs against: the explicitly
    /// configured one when present, the active one otherwise.
    pub fn enforced_environment(&self) -> &str {
        self.configured_environment
            .as_deref()
            .unwrap_or(&self.environment)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node_name: "agent".to_string(),
            environment: "production".to_string(),
            configured_environment: None,
            server: "localhost".to_string(),
            server_port: 8140,
            server_list: Vec::new(),
            use_cached_catalog: false,
            use_cache_on_failure: true,
            noop: false,
            strict_environment: false,
            prerun_command: String::new(),
            postrun_command: String::new(),
            checksum_types: vec!["sha256".to_string()],
            last_run_summary_path: PathBuf::from("last_run_summary.yaml"),
            last_run_summary_mode: DEFAULT_SUMMARY_FILE_MODE.to_string(),
            report: true,
            summarize: false,
        }
    }
}
