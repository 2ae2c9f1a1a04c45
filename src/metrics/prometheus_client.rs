//! Metrics Source Locator and Prometheus HTTP client.
//!
//! Produces a reachable Prometheus query API, either from an explicit URL or
//! by finding a well-known Prometheus service in the cluster. Outside the
//! cluster the service is reached through a `kubectl port-forward` tunnel
//! owned by the returned [`PrometheusSource`].
//!
//! # Example
//!
//! ```rust,ignore
//! let source = PrometheusSource::connect(&client, &PrometheusOptions::default()).await?;
//! let samples = source.query_range("up", start, end, 300).await;
//! source.close().await;
//! ```

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use log::{debug, info};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::port_forward::{PortForward, PortForwardSpec};
use super::types::Sample;

/// Service names tried during auto-detection, in order.
pub const SERVICE_NAMES: &[&str] = &[
    "prometheus-server",
    "prometheus-service",
    "prometheus",
    "kube-prometheus-stack-prometheus",
    "prometheus-kube-prometheus-prometheus",
];

/// Namespaces searched when none is given, in order.
pub const NAMESPACES: &[&str] = &[
    "prometheus-system",
    "prometheus",
    "monitoring",
    "kube-prometheus-stack",
    "observability",
    "default",
];

/// Present only when running inside a pod.
pub const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

pub const DEFAULT_LOCAL_PORT: u16 = 9090;

/// Error type for Prometheus client operations.
#[derive(Debug, thiserror::Error)]
pub enum PrometheusError {
    #[error("Prometheus unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("No data available for the specified time range")]
    NoData,

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone)]
pub struct PrometheusOptions {
    /// Explicit endpoint; disables detection and tunneling
    pub url: Option<String>,
    /// Only search this namespace during detection
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub local_port: u16,
    pub timeout: Duration,
}

impl Default for PrometheusOptions {
    fn default() -> Self {
        Self {
            url: None,
            namespace: None,
            kubeconfig: None,
            context: None,
            local_port: DEFAULT_LOCAL_PORT,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A Prometheus service found in the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLocation {
    pub name: String,
    pub namespace: String,
    pub port: u16,
}

impl ServiceLocation {
    pub fn cluster_url(&self) -> String {
        format!("http://{}.{}.svc.cluster.local:{}/", self.name, self.namespace, self.port)
    }
}

/// A verified Prometheus endpoint, plus the tunnel that serves it if one was
/// needed.
#[derive(Debug)]
pub struct PrometheusSource {
    base_url: String,
    http_client: HttpClient,
    tunnel: Option<PortForward>,
}

impl PrometheusSource {
    /// Locate Prometheus and verify it answers queries.
    ///
    /// A tunnel started along the way is closed again if the liveness check
    /// fails.
    pub async fn connect(client: &Client, options: &PrometheusOptions) -> Result<Self, PrometheusError> {
        if let Some(url) = &options.url {
            return Self::from_url(url, options.timeout).await;
        }

        let http_client = http_client(options.timeout)?;
        let location = detect_service(client, options.namespace.as_deref()).await?;
        info!(
            "Found Prometheus service {}/{} on port {}",
            location.namespace, location.name, location.port
        );

        let (base_url, tunnel) = if is_running_in_cluster() {
            (location.cluster_url(), None)
        } else {
            let spec = PortForwardSpec {
                service: location.name.clone(),
                namespace: location.namespace.clone(),
                remote_port: location.port,
                local_port: options.local_port,
                kubeconfig: options.kubeconfig.clone(),
                context: options.context.clone(),
            };
            let tunnel = PortForward::start(&spec).await.map_err(|e| {
                PrometheusError::Unavailable(format!(
                    "port-forward to {}/{} failed: {}",
                    location.namespace, location.name, e
                ))
            })?;
            (tunnel.base_url(), Some(tunnel))
        };

        let source = Self {
            base_url,
            http_client,
            tunnel,
        };

        if let Err(e) = source.probe().await {
            let url = source.base_url.clone();
            source.close().await;
            return Err(PrometheusError::Unavailable(format!("{} is not responding: {}", url, e)));
        }

        Ok(source)
    }

    /// Use an explicit endpoint without detection or tunneling.
    pub async fn from_url(url: &str, timeout: Duration) -> Result<Self, PrometheusError> {
        let source = Self {
            base_url: normalize_url(url),
            http_client: http_client(timeout)?,
            tunnel: None,
        };

        source.probe().await.map_err(|e| {
            PrometheusError::Unavailable(format!("{} is not responding: {}", source.base_url, e))
        })?;

        Ok(source)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_tunneled(&self) -> bool {
        self.tunnel.is_some()
    }

    /// Liveness probe: an instant `up` query must succeed.
    pub async fn probe(&self) -> Result<(), PrometheusError> {
        let url = format!("{}api/v1/query?query=up", self.base_url);
        let response = self.http_client.get(&url).send().await?;
        let body = read_response(response).await?;
        debug!(
            "Prometheus probe ok ({} series)",
            body.data.result.map(|r| r.len()).unwrap_or(0)
        );
        Ok(())
    }

    /// Range query. Only the first returned series is used; values that do
    /// not parse as finite numbers are dropped.
    pub async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_seconds: u64,
    ) -> Result<Vec<Sample>, PrometheusError> {
        let url = format!(
            "{}api/v1/query_range?query={}&start={}&end={}&step={}",
            self.base_url,
            urlencoding::encode(query),
            start.timestamp(),
            end.timestamp(),
            step_seconds
        );

        let response = self.http_client.get(&url).send().await?;
        let body = read_response(response).await?;

        let values = body
            .data
            .result
            .and_then(|series| series.into_iter().next())
            .and_then(|first| first.values)
            .unwrap_or_default();

        Ok(values
            .into_iter()
            .filter_map(|(ts, raw)| {
                let value = raw.parse::<f64>().ok().filter(|v| v.is_finite())?;
                let timestamp = DateTime::from_timestamp_millis((ts * 1000.0).round() as i64)?;
                Some(Sample { timestamp, value })
            })
            .collect())
    }

    /// Release the tunnel, if any.
    pub async fn close(self) {
        if let Some(tunnel) = self.tunnel {
            tunnel.close().await;
        }
    }
}

fn http_client(timeout: Duration) -> Result<HttpClient, PrometheusError> {
    Ok(HttpClient::builder().timeout(timeout).build()?)
}

async fn read_response(response: reqwest::Response) -> Result<PrometheusResponse, PrometheusError> {
    if !response.status().is_success() {
        return Err(PrometheusError::QueryFailed(format!(
            "HTTP {}: {}",
            response.status(),
            response.text().await.unwrap_or_default()
        )));
    }

    let body: PrometheusResponse = response
        .json()
        .await
        .map_err(|e| PrometheusError::ParseError(e.to_string()))?;

    if body.status != "success" {
        return Err(PrometheusError::QueryFailed(
            body.error.unwrap_or_else(|| format!("status '{}'", body.status)),
        ));
    }

    Ok(body)
}

/// Prefix a scheme when missing and ensure a trailing slash.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let mut normalized = if url.starts_with("http") {
        url.to_string()
    } else {
        format!("http://{}", url)
    };
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

pub fn is_running_in_cluster() -> bool {
    Path::new(SERVICE_ACCOUNT_TOKEN).exists()
}

/// First well-known Prometheus service, scanning namespaces in order and
/// service names within each.
pub async fn detect_service(client: &Client, namespace: Option<&str>) -> Result<ServiceLocation, PrometheusError> {
    let namespaces: Vec<&str> = match namespace {
        Some(ns) => vec![ns],
        None => NAMESPACES.to_vec(),
    };

    for ns in &namespaces {
        let services: Api<Service> = Api::namespaced(client.clone(), ns);
        for name in SERVICE_NAMES {
            match services.get_opt(name).await {
                Ok(Some(service)) => {
                    return Ok(ServiceLocation {
                        name: name.to_string(),
                        namespace: ns.to_string(),
                        port: service_port(&service),
                    });
                }
                Ok(None) => {}
                Err(e) => debug!("Lookup of {}/{} failed: {}", ns, name, e),
            }
        }
    }

    Err(PrometheusError::Unavailable(format!(
        "no Prometheus service found in namespaces: {}",
        namespaces.join(", ")
    )))
}

/// First declared port, or 80.
pub fn service_port(service: &Service) -> u16 {
    service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .and_then(|ports| ports.first())
        .and_then(|p| u16::try_from(p.port).ok())
        .unwrap_or(80)
}

// ============================================================================
// Prometheus API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct PrometheusResponse {
    status: String,
    error: Option<String>,
    #[serde(default)]
    data: PrometheusData,
}

#[derive(Debug, Default, Deserialize)]
struct PrometheusData {
    #[serde(rename = "resultType")]
    #[allow(dead_code)]
    result_type: Option<String>,
    result: Option<Vec<PrometheusResult>>,
}

#[derive(Debug, Deserialize)]
struct PrometheusResult {
    #[allow(dead_code)]
    metric: HashMap<String, String>,
    values: Option<Vec<(f64, String)>>,
}
