//! Kubernetes side of the pipeline: connecting to the cluster, resolving
//! resource types, fetching resources and reading autoscaler state.

pub mod discovery;
pub mod gatherer;
pub mod resource;
pub mod scaling;

pub use discovery::{DiscoveryIndex, KubeDiscovery, ResourceCoordinate};
pub use gatherer::{GatherResult, GatheredResource, ResourceGatherer};
pub use resource::{KubeObject, ResourceRef};
pub use scaling::{ScalingConfig, ScalingKind};

use kube::{
    Client, Config,
    config::{KubeConfigOptions, Kubeconfig},
};
use log::debug;
use std::path::Path;
use std::time::Duration;

/// Timeout applied to every Kubernetes API read.
pub const API_READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Failed to create Kubernetes client: {0}")]
    ClientCreation(#[from] kube::Error),

    #[error("Failed to read kubeconfig: {0}")]
    KubeconfigError(#[from] kube::config::KubeconfigError),
}

/// Install the rustls crypto provider used by the Kubernetes client.
///
/// Safe to call more than once; later calls are no-ops.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Build a client for the current cluster.
///
/// In-cluster service-account credentials win unless a kubeconfig path or
/// context was requested explicitly.
pub async fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Client, ClusterError> {
    install_crypto_provider();

    let incluster = if kubeconfig.is_none() && context.is_none() {
        Config::incluster().ok()
    } else {
        None
    };

    let mut config = match incluster {
        Some(config) => {
            debug!("Using in-cluster Kubernetes configuration");
            config
        }
        None => {
            let kubeconfig = match kubeconfig {
                Some(path) => Kubeconfig::read_from(path)?,
                None => Kubeconfig::read()?,
            };
            let options = KubeConfigOptions {
                context: context.map(str::to_string),
                ..Default::default()
            };
            Config::from_custom_kubeconfig(kubeconfig, &options).await?
        }
    };

    config.read_timeout = Some(API_READ_TIMEOUT);
    debug!("Connecting to Kubernetes API at {}", config.cluster_url);

    Ok(Client::try_from(config)?)
}
