//! Endpoint verification
//!
//! [`Verifier::check`] yields one [`HealthReport`] per endpoint, probing
//! lazily as the stream is polled. A failed probe is a report, never an
//! error.

use crate::addresses::AddressBook;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use vmflow_cloud::InfrastructureOutputs;
use vmflow_core::{GatewayMode, RunConfiguration};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const APP_PORT: u16 = 8000;
pub const DATABASE_PORT: u16 = 5432;
pub const STORAGE_PORT: u16 = 9000;
pub const MONITORING_PORT: u16 = 3000;

/// How an endpoint is probed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Http {
        url: String,
        expected: RangeInclusive<u16>,
    },
    Tcp {
        address: String,
    },
}

impl Probe {
    pub fn target(&self) -> &str {
        match self {
            Probe::Http { url, .. } => url,
            Probe::Tcp { address } => address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub probe: Probe,
    /// Counts toward overall health
    pub required: bool,
}

/// Endpoints implied by the configuration and current addresses
pub fn default_endpoints(
    cfg: &RunConfiguration,
    outputs: &InfrastructureOutputs,
) -> Result<Vec<Endpoint>> {
    let book = AddressBook::new(outputs, cfg);
    let gateway = book
        .gateway_url
        .clone()
        .ok_or_else(|| PipelineError::MissingOutput("public_ip".to_string()))?;
    let internal = book.connection.clone().ok_or_else(|| {
        PipelineError::MissingOutput(format!("{}_ip", cfg.main_network))
    })?;

    let app_url = match cfg.gateway_mode {
        GatewayMode::Proxy => format!("{}/health", gateway),
        GatewayMode::Direct => format!("http://{}:{}/health", internal, APP_PORT),
    };

    let mut probes = vec![
        (
            "gateway",
            Probe::Http {
                url: gateway,
                expected: 200..=399,
            },
        ),
        (
            "app",
            Probe::Http {
                url: app_url,
                expected: 200..=299,
            },
        ),
        (
            "database",
            Probe::Tcp {
                address: format!("{}:{}", internal, DATABASE_PORT),
            },
        ),
        (
            "storage",
            Probe::Tcp {
                address: format!("{}:{}", internal, STORAGE_PORT),
            },
        ),
    ];
    if cfg.monitoring_enabled {
        probes.push((
            "monitoring",
            Probe::Tcp {
                address: format!("{}:{}", internal, MONITORING_PORT),
            },
        ));
    }

    Ok(probes
        .into_iter()
        .map(|(name, probe)| Endpoint {
            name: name.to_string(),
            probe,
            required: cfg.required_endpoints.iter().any(|r| r == name),
        })
        .collect())
}

/// Executes a single probe. `Ok` carries a detail line for healthy
/// endpoints, `Err` the reason for unhealthy ones.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, probe: &Probe) -> std::result::Result<String, String>;
}

/// Prober using real HTTP requests and TCP connects
pub struct NetProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl NetProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::build(timeout, false)
    }

    /// Accept certificates from a staging CA
    pub fn insecure(timeout: Duration) -> Result<Self> {
        Self::build(timeout, true)
    }

    fn build(timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            // tunnel addresses are never reachable through a proxy
            .no_proxy()
            .user_agent(concat!("vmflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Prober for NetProber {
    async fn probe(&self, probe: &Probe) -> std::result::Result<String, String> {
        match probe {
            Probe::Http { url, expected } => {
                let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
                let status = response.status().as_u16();
                if expected.contains(&status) {
                    Ok(format!("HTTP {}", status))
                } else {
                    Err(format!("unexpected HTTP {}", status))
                }
            }
            Probe::Tcp { address } => {
                match tokio::time::timeout(self.timeout, TcpStream::connect(address.as_str())).await
                {
                    Ok(Ok(_)) => Ok("port open".to_string()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("timed out after {}s", self.timeout.as_secs())),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub endpoint: String,
    pub target: String,
    pub required: bool,
    pub healthy: bool,
    pub detail: String,
    pub elapsed_ms: u64,
}

pub struct Verifier {
    prober: Arc<dyn Prober>,
}

impl Verifier {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    /// One pass over `endpoints`. Nothing is probed until the stream is
    /// polled; calling `check` again starts a fresh pass.
    pub fn check<'a>(
        &'a self,
        endpoints: &'a [Endpoint],
    ) -> impl Stream<Item = HealthReport> + Send + 'a {
        stream::iter(endpoints).then(move |endpoint| async move {
            let start = Instant::now();
            let result = self.prober.probe(&endpoint.probe).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            let (healthy, detail) = match result {
                Ok(detail) => (true, detail),
                Err(detail) => (false, detail),
            };
            HealthReport {
                endpoint: endpoint.name.clone(),
                target: endpoint.probe.target().to_string(),
                required: endpoint.required,
                healthy,
                detail,
                elapsed_ms,
            }
        })
    }
}

/// Collected result of one verification pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub reports: Vec<HealthReport>,
}

impl HealthSummary {
    pub async fn collect(stream: impl Stream<Item = HealthReport>) -> Self {
        Self {
            reports: stream.collect().await,
        }
    }

    /// Every required endpoint is healthy
    pub fn healthy(&self) -> bool {
        self.reports.iter().filter(|r| r.required).all(|r| r.healthy)
    }

    pub fn unhealthy_required(&self) -> Vec<String> {
        self.reports
            .iter()
            .filter(|r| r.required && !r.healthy)
            .map(|r| r.endpoint.clone())
            .collect()
    }
}
