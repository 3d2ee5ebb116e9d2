//! Server failover: probe the configured server list in order and commit to
//! the first functional endpoint for the duration of a run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::{PROBE_TIMEOUT, STATUS_PROBE_PATH};

/// A candidate server taken from the configured ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
}

impl ServerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Raised when every endpoint in the configured list failed its probe.
///
/// The message carries the original list verbatim so the operator can see
/// exactly what was tried and in which order.
#[derive(Debug, Error)]
#[error("could not select a functional server from: [{server_list}]")]
pub struct NoFunctionalServer {
    pub server_list: String,
}

/// Response from a liveness probe. Selection only looks at the status code.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
}

/// Probe collaborator: one GET against a candidate endpoint.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn get(&self, endpoint: &ServerEndpoint, path: &str) -> Result<ProbeResponse>;
}

/// HTTPS probe with a bounded per-request timeout.
pub struct HttpStatusProbe {
    client: reqwest::Client,
}

impl HttpStatusProbe {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .context("failed to build status probe HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StatusProbe for HttpStatusProbe {
    async fn get(&self, endpoint: &ServerEndpoint, path: &str) -> Result<ProbeResponse> {
        let url = format!("https://{}:{}{}", endpoint.host, endpoint.port, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("probe request to {} failed", url))?;

        Ok(ProbeResponse {
            status: response.status().as_u16(),
        })
    }
}

/// Walks the configured server list in order and commits to the first
/// endpoint whose probe shows the service is reachable.
pub struct ServerSelector {
    probe: Arc<dyn StatusProbe>,
}

impl ServerSelector {
    pub fn new(probe: Arc<dyn StatusProbe>) -> Self {
        Self { probe }
    }

    /// Select one functional endpoint from `endpoints`.
    ///
    /// An OK answer or a Forbidden answer both count as functional: Forbidden
    /// means the service is alive but denies this check, which is still
    /// evidence of reachability. Anything else, including a timeout or a
    /// connection error, moves on to the next candidate. Already-rejected
    /// endpoints are not retried within the same run.
    pub async fn select(
        &self,
        endpoints: &[ServerEndpoint],
    ) -> Result<ServerEndpoint, NoFunctionalServer> {
        for endpoint in endpoints {
            match self.probe.get(endpoint, STATUS_PROBE_PATH).await {
                Ok(response) if Self::is_functional(response.status) => {
                    debug!(server = %endpoint, status = response.status, "selected functional server");
                    return Ok(endpoint.clone());
                }
                Ok(response) => {
                    debug!(
                        server = %endpoint,
                        status = response.status,
                        "server answered with a non-functional status, trying next"
                    );
                }
                Err(error) => {
                    debug!(server = %endpoint, %error, "server probe failed, trying next");
                }
            }
        }

        Err(NoFunctionalServer {
            server_list: render_server_list(endpoints),
        })
    }

    fn is_functional(status: u16) -> bool {
        status == reqwest::StatusCode::OK.as_u16()
            || status == reqwest::StatusCode::FORBIDDEN.as_u16()
    }
}

/// Render the configured list exactly as it was given, in order.
pub fn render_server_list(endpoints: &[ServerEndpoint]) -> String {
    endpoints
        .iter()
        .map(ServerEndpoint::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
