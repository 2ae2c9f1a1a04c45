//! Crate-level error type.
//!
//! Each subsystem owns its own error enum; this module folds them together so
//! the command handlers can use `?` across subsystem boundaries.

use std::path::PathBuf;
use thiserror::Error;

use crate::analysis::llm::LlmError;
use crate::cluster::discovery::DiscoveryError;
use crate::cluster::gatherer::GatherError;
use crate::cluster::ClusterError;
use crate::metrics::collector::MetricsError;
use crate::metrics::prometheus_client::PrometheusError;

#[derive(Error, Debug)]
pub enum KubeAiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Kubernetes connection failed: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Resource discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Resource gathering failed: {0}")]
    Gather(#[from] GatherError),

    #[error("Prometheus error: {0}")]
    Prometheus(#[from] PrometheusError),

    #[error("Metrics collection failed: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Analysis failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    ParsingFailed { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, KubeAiError>;
