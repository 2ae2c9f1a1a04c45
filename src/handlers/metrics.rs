use futures_util::future::join_all;
use kube::Client;
use log::{debug, info};
use std::time::Duration;

use super::{GlobalOptions, finish, llm_client};
use crate::analysis::{AnalysisRequest, MetricsAnalysisOptions};
use crate::cli::LlmArgs;
use crate::cluster::discovery::BuiltinKind;
use crate::cluster::scaling::current_scaling_config;
use crate::cluster::{self, DiscoveryIndex, KubeDiscovery, ResourceGatherer, ResourceRef};
use crate::config::Config;
use crate::error::{KubeAiError, Result};
use crate::formatter;
use crate::metrics::recommender::{recommend_hpa, recommend_keda};
use crate::metrics::{
    MetricsCollector, PrometheusOptions, PrometheusSource, ResourceMetrics, parse_duration,
};

#[derive(Debug, Clone, Default)]
pub struct MetricsOptions {
    pub target: Option<String>,
    pub resources: Vec<String>,
    pub all_deployments: bool,
    pub duration: String,
    pub analyze: bool,
    pub compare_scaling_config: bool,
    pub hpa_analysis: bool,
    pub keda_analysis: bool,
    pub prometheus_url: Option<String>,
    pub prometheus_namespace: Option<String>,
    pub llm: LlmArgs,
}

impl MetricsOptions {
    fn references(&self) -> Vec<String> {
        self.target
            .iter()
            .chain(self.resources.iter())
            .cloned()
            .collect()
    }

    fn analysis_options(&self) -> MetricsAnalysisOptions {
        MetricsAnalysisOptions {
            compare_scaling_config: self.compare_scaling_config,
            hpa_analysis: self.hpa_analysis,
            keda_analysis: self.keda_analysis,
        }
    }

    fn wants_scaling_config(&self) -> bool {
        self.compare_scaling_config || self.analyze
    }

    fn prometheus_options(&self, globals: &GlobalOptions, config: &Config) -> PrometheusOptions {
        PrometheusOptions {
            url: self.prometheus_url.clone().or_else(|| config.prometheus.url.clone()),
            namespace: self
                .prometheus_namespace
                .clone()
                .or_else(|| config.prometheus.namespace.clone()),
            kubeconfig: globals.kubeconfig.clone(),
            context: globals.context.clone(),
            local_port: config.prometheus.local_port,
            timeout: Duration::from_secs(config.prometheus.timeout_secs),
        }
    }
}

/// Collect Prometheus time series for deployments, then print them or hand
/// them to the LLM together with the deployments' cluster state.
pub async fn handle_metrics(globals: &GlobalOptions, options: MetricsOptions, config: &Config) -> Result<()> {
    parse_duration(&options.duration)?;

    let references = options.references();
    if references.is_empty() && !options.all_deployments {
        return Err(KubeAiError::InvalidInput(
            "specify a workload as TYPE/NAME, use -r, or pass --all-deployments".to_string(),
        ));
    }

    let llm = if options.analyze {
        Some(llm_client(&options.llm, config)?)
    } else {
        None
    };

    let client = cluster::connect(globals.kubeconfig.as_deref(), globals.context.as_deref()).await?;
    let index = DiscoveryIndex::new(KubeDiscovery::new(client.clone()));
    let gatherer = ResourceGatherer::new(client.clone(), &index);

    let mut deployments = deployment_targets(globals, &references)?;
    if options.all_deployments {
        for name in gatherer.deployment_names(&globals.namespace).await? {
            if !deployments.contains(&name) {
                deployments.push(name);
            }
        }
    }
    if deployments.is_empty() {
        return Err(KubeAiError::InvalidInput(format!(
            "no deployments to inspect in namespace {}",
            globals.namespace
        )));
    }

    let spinner = globals.spinner("Connecting to Prometheus...");
    let source = PrometheusSource::connect(&client, &options.prometheus_options(globals, config)).await;
    finish(spinner);
    let source = source?;
    info!("Using Prometheus at {}", source.base_url());

    let spinner = globals.spinner(&format!(
        "Collecting {} of metrics for {} deployment(s)...",
        options.duration,
        deployments.len()
    ));
    let collected = join_all(
        deployments
            .iter()
            .map(|name| collect_deployment(&client, &source, globals, &options, name)),
    )
    .await;
    finish(spinner);
    source.close().await;

    let mut metrics = Vec::with_capacity(collected.len());
    for (name, result) in deployments.iter().zip(collected) {
        match result {
            Ok(m) => metrics.push(m),
            Err(e) => globals.warn(&format!("Skipping deployment/{}: {}", name, e)),
        }
    }
    if metrics.is_empty() {
        return Err(KubeAiError::InvalidInput(
            "no metrics could be collected for the requested deployments".to_string(),
        ));
    }

    let Some(llm) = llm else {
        return formatter::print_metrics(&metrics, globals.output);
    };

    let spinner = globals.spinner("Gathering deployment state...");
    let deployment_refs: Vec<String> = metrics
        .iter()
        .map(|m| format!("deployment/{}", m.resource_name))
        .collect();
    let gathered = gatherer
        .gather(&globals.namespace, &deployment_refs, false)
        .await;
    let cluster_summary = match gatherer.cluster_summary().await {
        Ok(summary) => Some(summary),
        Err(e) => {
            globals.warn(&format!("Could not summarize cluster nodes: {}", e));
            None
        }
    };
    finish(spinner);
    for warning in &gathered.warnings {
        globals.warn(warning);
    }

    let request = AnalysisRequest::Metrics {
        duration: options.duration.clone(),
        namespace: globals.namespace.clone(),
        resources: gathered.resources,
        metrics,
        cluster: cluster_summary,
        options: options.analysis_options(),
    };

    let spinner = globals.spinner(&format!(
        "Analyzing with {} ({})...",
        llm.provider(),
        llm.model()
    ));
    let analysis = llm.analyze(&request).await;
    finish(spinner);

    formatter::print_analysis(&analysis?, globals.output)
}

/// Deployment names among the user's references; other kinds are reported and
/// skipped since the query catalog is written against deployment pods.
fn deployment_targets(globals: &GlobalOptions, references: &[String]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for raw in references {
        let reference: ResourceRef = raw.parse()?;
        if BuiltinKind::from_token(&reference.kind.to_lowercase()) == Some(BuiltinKind::Deployment) {
            if !names.contains(&reference.name) {
                names.push(reference.name);
            }
        } else {
            globals.warn(&format!(
                "Metrics are only collected for deployments; skipping {}",
                reference
            ));
        }
    }
    Ok(names)
}

async fn collect_deployment(
    client: &Client,
    source: &PrometheusSource,
    globals: &GlobalOptions,
    options: &MetricsOptions,
    name: &str,
) -> Result<ResourceMetrics> {
    let namespace = globals.namespace.as_str();
    let series = MetricsCollector::new(source)
        .collect(name, namespace, &options.duration)
        .await?;
    debug!("Collected {} series for deployment/{}", series.len(), name);

    let mut metrics = ResourceMetrics::new(name, namespace, &options.duration, series);

    if options.wants_scaling_config() {
        metrics.scaling_config = Some(current_scaling_config(client, namespace, name).await);
    }
    if options.hpa_analysis {
        metrics.hpa_recommendation = Some(recommend_hpa(name, namespace, &metrics.summaries)?);
    }
    if options.keda_analysis {
        metrics.keda_recommendation = Some(recommend_keda(
            name,
            namespace,
            source.base_url(),
            &metrics.summaries,
        )?);
    }

    Ok(metrics)
}
