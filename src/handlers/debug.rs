use colored::Colorize;
use log::info;

use super::{GlobalOptions, finish, llm_client};
use crate::analysis::AnalysisRequest;
use crate::cli::LlmArgs;
use crate::cluster::{self, DiscoveryIndex, KubeDiscovery, ResourceGatherer};
use crate::config::Config;
use crate::error::{KubeAiError, Result};
use crate::formatter;

#[derive(Debug, Clone, Default)]
pub struct DebugOptions {
    pub problem: String,
    pub resources: Vec<String>,
    pub all: bool,
    pub llm: LlmArgs,
}

/// Gather resource state and ask the LLM to diagnose the problem.
pub async fn handle_debug(globals: &GlobalOptions, options: DebugOptions, config: &Config) -> Result<()> {
    if options.problem.trim().is_empty() {
        return Err(KubeAiError::InvalidInput("describe the problem to debug".to_string()));
    }
    if options.resources.is_empty() && !options.all {
        return Err(KubeAiError::InvalidInput(
            "specify at least one resource with -r TYPE/NAME, or use --all".to_string(),
        ));
    }

    let llm = llm_client(&options.llm, config)?;

    let client = cluster::connect(globals.kubeconfig.as_deref(), globals.context.as_deref()).await?;
    let index = DiscoveryIndex::new(KubeDiscovery::new(client.clone()));
    let gatherer = ResourceGatherer::new(client, &index);

    let spinner = globals.spinner(&format!("Gathering resources in {}...", globals.namespace));
    let gathered = gatherer
        .gather(&globals.namespace, &options.resources, options.all)
        .await;
    finish(spinner);

    for warning in &gathered.warnings {
        globals.warn(warning);
    }
    if gathered.resources.is_empty() {
        return Err(KubeAiError::InvalidInput(format!(
            "nothing could be gathered from namespace {}",
            globals.namespace
        )));
    }
    info!("Gathered {} resource entries", gathered.resources.len());

    let request = AnalysisRequest::Debug {
        problem: options.problem,
        namespace: globals.namespace.clone(),
        resources: gathered.resources,
    };

    let spinner = globals.spinner(&format!(
        "Analyzing with {} ({})...",
        llm.provider(),
        llm.model()
    ));
    let analysis = llm.analyze(&request).await;
    finish(spinner);

    let analysis = analysis?;
    formatter::print_analysis(&analysis, globals.output)?;

    if globals.interactive() {
        println!("\n{}", "Analysis complete.".green());
    }
    Ok(())
}
