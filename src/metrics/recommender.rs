//! Autoscaler recommendations derived from collected metrics.

use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec, MetricSpec,
    MetricTarget, ResourceMetricSource,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use super::queries;
use super::types::MetricSummary;

const HPA_MIN_REPLICAS: i32 = 2;
const HPA_MAX_REPLICAS: i32 = 10;

const KEDA_MIN_REPLICAS: i32 = 0;
const KEDA_MAX_REPLICAS: i32 = 10;
const KEDA_POLLING_INTERVAL: u32 = 30;
const KEDA_COOLDOWN_PERIOD: u32 = 300;
const KEDA_THRESHOLD: &str = "70";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HpaRecommendation {
    pub min_replicas: i32,
    pub max_replicas: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_cpu: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_memory: Option<i32>,
    pub manifest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KedaTrigger {
    #[serde(rename = "type")]
    pub kind: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KedaRecommendation {
    pub min_replicas: i32,
    pub max_replicas: i32,
    pub polling_interval: u32,
    pub cooldown_period: u32,
    pub triggers: Vec<KedaTrigger>,
    pub manifest: String,
}

/// Utilization target for a metric that peaked at `peak` percent.
pub fn target_utilization(peak: f64) -> i32 {
    if peak > 80.0 {
        70
    } else if peak > 60.0 {
        60
    } else {
        50
    }
}

fn target_for(summaries: &BTreeMap<String, MetricSummary>, name: &str) -> Option<i32> {
    summaries
        .get(name)
        .filter(|s| s.stats.average > 0.0)
        .map(|s| target_utilization(s.stats.peak))
}

fn resource_metric(name: &str, utilization: i32) -> MetricSpec {
    MetricSpec {
        type_: "Resource".to_string(),
        resource: Some(ResourceMetricSource {
            name: name.to_string(),
            target: MetricTarget {
                type_: "Utilization".to_string(),
                average_utilization: Some(utilization),
                ..Default::default()
            },
        }),
        ..Default::default()
    }
}

pub fn recommend_hpa(
    workload: &str,
    namespace: &str,
    summaries: &BTreeMap<String, MetricSummary>,
) -> Result<HpaRecommendation, serde_yaml::Error> {
    let target_cpu = target_for(summaries, "cpu_utilization");
    let target_memory = target_for(summaries, "memory_utilization");

    let metrics: Vec<MetricSpec> = [("cpu", target_cpu), ("memory", target_memory)]
        .into_iter()
        .filter_map(|(name, target)| target.map(|t| resource_metric(name, t)))
        .collect();

    let hpa = HorizontalPodAutoscaler {
        metadata: ObjectMeta {
            name: Some(format!("{}-hpa", workload)),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: workload.to_string(),
            },
            min_replicas: Some(HPA_MIN_REPLICAS),
            max_replicas: HPA_MAX_REPLICAS,
            metrics: (!metrics.is_empty()).then_some(metrics),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(HpaRecommendation {
        min_replicas: HPA_MIN_REPLICAS,
        max_replicas: HPA_MAX_REPLICAS,
        target_cpu,
        target_memory,
        manifest: serde_yaml::to_string(&hpa)?,
    })
}

/// KEDA ScaledObject driven by the workload's CPU rate in Prometheus, or by
/// the built-in CPU scaler when no CPU data was collected.
pub fn recommend_keda(
    workload: &str,
    namespace: &str,
    prometheus_url: &str,
    summaries: &BTreeMap<String, MetricSummary>,
) -> Result<KedaRecommendation, serde_yaml::Error> {
    let cpu_query = summaries
        .contains_key("cpu_utilization")
        .then(|| queries::find("cpu_utilization"))
        .flatten()
        .map(|q| q.render(workload, namespace));

    let trigger = match cpu_query {
        Some(query) => KedaTrigger {
            kind: "prometheus".to_string(),
            metadata: BTreeMap::from([
                ("serverAddress".to_string(), prometheus_url.trim_end_matches('/').to_string()),
                ("query".to_string(), query),
                ("threshold".to_string(), KEDA_THRESHOLD.to_string()),
            ]),
        },
        None => KedaTrigger {
            kind: "cpu".to_string(),
            metadata: BTreeMap::from([
                ("type".to_string(), "Utilization".to_string()),
                ("value".to_string(), KEDA_THRESHOLD.to_string()),
            ]),
        },
    };

    let manifest = json!({
        "apiVersion": "keda.sh/v1alpha1",
        "kind": "ScaledObject",
        "metadata": {
            "name": format!("{}-scaledobject", workload),
            "namespace": namespace,
        },
        "spec": {
            "scaleTargetRef": { "name": workload },
            "minReplicaCount": KEDA_MIN_REPLICAS,
            "maxReplicaCount": KEDA_MAX_REPLICAS,
            "pollingInterval": KEDA_POLLING_INTERVAL,
            "cooldownPeriod": KEDA_COOLDOWN_PERIOD,
            "triggers": [&trigger],
        }
    });

    Ok(KedaRecommendation {
        min_replicas: KEDA_MIN_REPLICAS,
        max_replicas: KEDA_MAX_REPLICAS,
        polling_interval: KEDA_POLLING_INTERVAL,
        cooldown_period: KEDA_COOLDOWN_PERIOD,
        triggers: vec![trigger],
        manifest: serde_yaml::to_string(&manifest)?,
    })
}
