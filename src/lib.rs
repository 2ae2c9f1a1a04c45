//! # kubectl-ai
//!
//! Diagnoses Kubernetes workloads by combining live cluster state, Prometheus
//! time series and an LLM.
//!
//! ## Features
//!
//! - **Resource Gathering**: Fetches named resources (built-in kinds and CRDs via API discovery) with their pods and recent events
//! - **Metrics Collection**: Locates Prometheus in the cluster, tunnels to it when needed and summarizes workload time series
//! - **Scaling Advice**: Compares usage against HPA or KEDA settings and drafts new autoscaler manifests
//! - **Analysis**: Sends the assembled context to Claude or OpenAI and renders a structured diagnosis
//!
//! ## Example
//!
//! ```rust,no_run
//! use kubectl_ai::cluster::{self, DiscoveryIndex, KubeDiscovery, ResourceGatherer};
//!
//! # async fn example() -> kubectl_ai::Result<()> {
//! let client = cluster::connect(None, None).await?;
//! let index = DiscoveryIndex::new(KubeDiscovery::new(client.clone()));
//! let gathered = ResourceGatherer::new(client, &index)
//!     .gather("default", &["deployment/web".to_string()], false)
//!     .await;
//! println!("{}", serde_json::to_string_pretty(&gathered.resources)?);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod formatter;
pub mod handlers;
pub mod metrics;

pub use error::{KubeAiError, Result};

use cli::{Cli, Commands, OutputFormat};
use config::Config;
use handlers::{DebugOptions, GlobalOptions, MetricsOptions};

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Merge command-line flags over the loaded config and dispatch the command.
pub async fn run_command(cli: Cli, config: Config) -> Result<()> {
    let globals = GlobalOptions {
        kubeconfig: cli.kubeconfig.or_else(|| config.kubernetes.kubeconfig.clone()),
        context: cli.context.or_else(|| config.kubernetes.context.clone()),
        namespace: cli
            .namespace
            .or_else(|| config.kubernetes.namespace.clone())
            .unwrap_or_else(|| "default".to_string()),
        output: cli.output.or(config.output.format).unwrap_or(OutputFormat::Human),
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Debug {
            problem,
            resources,
            all,
            llm,
        } => {
            let options = DebugOptions {
                problem,
                resources,
                all,
                llm,
            };
            handlers::handle_debug(&globals, options, &config).await
        }
        Commands::Metrics {
            target,
            resources,
            all_deployments,
            duration,
            analyze,
            compare_scaling_config,
            hpa_analysis,
            keda_analysis,
            prometheus_url,
            prometheus_namespace,
            llm,
        } => {
            let options = MetricsOptions {
                target,
                resources,
                all_deployments,
                duration,
                analyze,
                compare_scaling_config,
                hpa_analysis,
                keda_analysis,
                prometheus_url,
                prometheus_namespace,
                llm,
            };
            handlers::handle_metrics(&globals, options, &config).await
        }
        Commands::Version => {
            println!("kubectl-ai {}", VERSION);
            Ok(())
        }
    }
}
