//! Configuration constants for the agent run pipeline
//!
//! This module centralizes all tunable parameters and constants used throughout
//! the orchestrator.

use std::time::Duration;

// ============================================================================
// Server Failover Configuration
// ============================================================================

/// Timeout for a single liveness probe against a candidate server
///
/// Kept short because the selector walks the configured list sequentially;
/// a slow endpoint should not stall the whole run for longer than this.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Well-known path used for the liveness probe
///
/// The probe only needs to establish that the service is alive; a Forbidden
/// answer on this path still counts as a functional endpoint.
pub const STATUS_PROBE_PATH: &str = "/status/v1/simple/server";

// ============================================================================
// Catalog Retrieval Configuration
// ============================================================================

/// Maximum number of catalog re-fetches after adopting the server's environment
///
/// When the retrieved catalog names a different environment than the one the
/// agent was configured with, the agent switches and re-requests once. The
/// bound prevents an infinite reconciliation loop if the server keeps moving
/// the node between environments.
pub const ENVIRONMENT_SWITCH_RETRY_LIMIT: u32 = 1;

/// Facts serialization format sent alongside fresh-catalog requests
pub const FACTS_FORMAT: &str = "application/json";

// ============================================================================
// Report Configuration
// ============================================================================

/// Default permission mode for the last-run summary file
///
/// Restrictive by default: the summary can contain resource titles and
/// messages that should not be world-readable.
pub const DEFAULT_SUMMARY_FILE_MODE: &str = "0640";

/// Reserved metric name holding the whole-run elapsed time
pub const TOTAL_TIME_METRIC: &str = "total";
