//! Prompt text for the LLM collaborator.

use super::{AnalysisRequest, MetricsAnalysisOptions};

const RESPONSE_FORMAT: &str = r#"Respond with a single JSON object and nothing else:
{
  "problem": "one-line restatement of the problem",
  "root_cause": "most likely root cause",
  "severity": "critical|high|medium|low",
  "issues": [
    {"component": "type/name", "severity": "critical|high|medium|low", "description": "...", "evidence": "field or event that shows it"}
  ],
  "suggestions": [
    {"priority": "high|medium|low", "action": "...", "command": "kubectl ... (optional)", "explanation": "..."}
  ],
  "quick_fix": "single command that fixes the most urgent issue, if one exists",
  "full_analysis": "detailed explanation"
}"#;

const DEBUG_PREAMBLE: &str = "You are a senior Kubernetes site reliability engineer. \
You are given the live state of Kubernetes resources, their pods and recent namespace events \
as JSON. Diagnose the user's problem from that evidence only. Cite the fields or events that \
support each finding. Secret values have been removed on purpose.";

const METRICS_PREAMBLE: &str = "You are a senior Kubernetes performance engineer. \
You are given Prometheus metrics for workloads (per-metric statistics, trend and utilization \
classification, raw samples) together with their resource definitions and autoscaler state. \
Assess whether the workloads are right-sized and scaled correctly, and point out saturation, \
waste and instability.";

/// System prompt for the request kind.
pub fn preamble(request: &AnalysisRequest) -> String {
    let base = match request {
        AnalysisRequest::Debug { .. } => DEBUG_PREAMBLE,
        AnalysisRequest::Metrics { .. } => METRICS_PREAMBLE,
    };
    format!("{}\n\n{}", base, RESPONSE_FORMAT)
}

/// User message: the task followed by the request payload.
pub fn user_prompt(request: &AnalysisRequest) -> serde_json::Result<String> {
    let task = match request {
        AnalysisRequest::Debug {
            problem, namespace, ..
        } => format!("Problem in namespace '{}': {}", namespace, problem),
        AnalysisRequest::Metrics {
            duration,
            namespace,
            options,
            ..
        } => metrics_task(duration, namespace, options),
    };

    Ok(format!("{}\n\nCluster data:\n{}", task, request.payload()?))
}

fn metrics_task(duration: &str, namespace: &str, options: &MetricsAnalysisOptions) -> String {
    let mut task = format!(
        "Analyze resource usage over the last {} in namespace '{}'.",
        duration, namespace
    );
    if options.compare_scaling_config {
        task.push_str(
            "\nCompare observed usage and scaling events with the current autoscaler configuration \
             and say whether its bounds and targets fit.",
        );
    }
    if options.hpa_analysis {
        task.push_str(
            "\nEvaluate the attached HPA recommendation and adjust its replica bounds or targets \
             if the data warrants it.",
        );
    }
    if options.keda_analysis {
        task.push_str(
            "\nEvaluate the attached KEDA ScaledObject recommendation, including whether scaling \
             to zero is safe for this workload.",
        );
    }
    task
}
