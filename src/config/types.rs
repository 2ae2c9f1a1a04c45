use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cli::OutputFormat;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub kubernetes: KubernetesConfig,
    pub prometheus: PrometheusConfig,
    pub llm: LlmConfig,
    pub output: OutputConfig,
}

/// Cluster access defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub namespace: Option<String>,
}

/// Prometheus access defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Skip auto-detection and use this endpoint
    pub url: Option<String>,
    /// Restrict service detection to a single namespace
    pub namespace: Option<String>,
    /// Local port for the kubectl port-forward tunnel
    pub local_port: u16,
    pub timeout_secs: u64,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            url: None,
            namespace: None,
            local_port: 9090,
            timeout_secs: 30,
        }
    }
}

/// LLM provider selection; API keys are only read from the environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: Option<OutputFormat>,
}
