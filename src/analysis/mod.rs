//! Analysis Orchestrator.
//!
//! Assembles gathered resources and metrics into a single request for the
//! LLM collaborator, and defines the structured result it returns.

pub mod llm;
pub mod prompts;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cluster::GatheredResource;
use crate::cluster::gatherer::ClusterSummary;
use crate::metrics::ResourceMetrics;

pub use llm::{LlmClient, LlmError, LlmProvider};

/// Which optional questions the metrics analysis should answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsAnalysisOptions {
    pub compare_scaling_config: bool,
    pub hpa_analysis: bool,
    pub keda_analysis: bool,
}

/// Everything the LLM sees for one invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisRequest {
    Debug {
        problem: String,
        namespace: String,
        resources: BTreeMap<String, GatheredResource>,
    },
    Metrics {
        duration: String,
        namespace: String,
        resources: BTreeMap<String, GatheredResource>,
        metrics: Vec<ResourceMetrics>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster: Option<ClusterSummary>,
        options: MetricsAnalysisOptions,
    },
}

impl AnalysisRequest {
    /// Pretty JSON embedded into the prompt.
    pub fn payload(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub root_cause: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_fix: Option<String>,
    #[serde(default)]
    pub full_analysis: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub evidence: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub explanation: String,
}
