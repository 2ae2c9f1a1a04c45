use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kubectl-ai")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Diagnose Kubernetes workloads with cluster state, Prometheus metrics and an LLM")]
#[command(long_about = "Gathers Kubernetes resources, their pods and events, and Prometheus time series for a workload, then asks an LLM for a root-cause analysis or scaling recommendations.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (defaults to ~/.kubectl-ai.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the kubeconfig file
    #[arg(long, global = true, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true, value_name = "NAME")]
    pub context: Option<String>,

    /// Namespace to operate in
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Diagnose a problem from the current state of cluster resources
    Debug {
        /// Description of the problem, e.g. "pods keep restarting"
        #[arg(value_name = "PROBLEM")]
        problem: String,

        /// Resource to include, as TYPE/NAME (repeatable)
        #[arg(short = 'r', long = "resource", value_name = "TYPE/NAME")]
        resources: Vec<String>,

        /// Include every common resource in the namespace
        #[arg(long, conflicts_with = "resources")]
        all: bool,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Collect Prometheus metrics for workloads and optionally analyze them
    Metrics {
        /// Workload to inspect, as TYPE/NAME
        #[arg(value_name = "TYPE/NAME")]
        target: Option<String>,

        /// Additional workload to inspect, as TYPE/NAME (repeatable)
        #[arg(short = 'r', long = "resource", value_name = "TYPE/NAME")]
        resources: Vec<String>,

        /// Inspect every deployment in the namespace
        #[arg(long)]
        all_deployments: bool,

        /// Lookback window: <number><m|h|d>, e.g. 30m, 6h, 7d
        #[arg(long, default_value = "1h")]
        duration: String,

        /// Send the collected data to the LLM for analysis
        #[arg(long)]
        analyze: bool,

        /// Ask the LLM to compare usage against the current autoscaler settings
        #[arg(long)]
        compare_scaling_config: bool,

        /// Produce an HPA recommendation
        #[arg(long)]
        hpa_analysis: bool,

        /// Produce a KEDA ScaledObject recommendation
        #[arg(long)]
        keda_analysis: bool,

        /// Prometheus URL (skips auto-detection and port-forwarding)
        #[arg(long, value_name = "URL")]
        prometheus_url: Option<String>,

        /// Only look for Prometheus in this namespace
        #[arg(long, value_name = "NAMESPACE")]
        prometheus_namespace: Option<String>,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Print version information
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LlmArgs {
    /// LLM provider: claude or openai
    #[arg(long, env = "LLM_PROVIDER")]
    pub provider: Option<String>,

    /// Model name (defaults depend on the provider)
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
