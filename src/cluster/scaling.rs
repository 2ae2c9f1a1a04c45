//! Current autoscaler state for a workload.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::{
    Client,
    api::{Api, ApiResource, DynamicObject, ListParams},
};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingKind {
    Hpa,
    Keda,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalingConfig {
    pub kind: ScalingKind,
    pub min_replicas: i32,
    pub max_replicas: i32,
    pub current_replicas: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_cpu: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_memory: Option<i32>,
    /// KEDA trigger types
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scalers: Vec<String>,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            kind: ScalingKind::None,
            min_replicas: 1,
            max_replicas: 1,
            current_replicas: 1,
            target_cpu: None,
            target_memory: None,
            scalers: Vec::new(),
        }
    }
}

impl ScalingConfig {
    pub fn from_hpa(hpa: &HorizontalPodAutoscaler) -> Self {
        let spec = hpa.spec.as_ref();
        let min_replicas = spec.and_then(|s| s.min_replicas).unwrap_or(1);
        let mut config = Self {
            kind: ScalingKind::Hpa,
            min_replicas,
            max_replicas: spec.map(|s| s.max_replicas).unwrap_or(min_replicas),
            current_replicas: hpa
                .status
                .as_ref()
                .and_then(|s| s.current_replicas)
                .unwrap_or(0),
            ..Default::default()
        };

        for metric in spec.and_then(|s| s.metrics.as_ref()).into_iter().flatten() {
            let Some(resource) = metric.resource.as_ref() else {
                continue;
            };
            let target = resource.target.average_utilization;
            match resource.name.as_str() {
                "cpu" => config.target_cpu = target,
                "memory" => config.target_memory = target,
                _ => {}
            }
        }

        config
    }

    pub fn from_scaled_object(object: &DynamicObject, current_replicas: i32) -> Self {
        let spec = &object.data["spec"];
        let replicas = |field: &str, default: i32| {
            spec.get(field)
                .and_then(Value::as_i64)
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or(default)
        };

        let scalers = spec
            .get("triggers")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|t| t.get("type").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        Self {
            kind: ScalingKind::Keda,
            min_replicas: replicas("minReplicaCount", 0),
            max_replicas: replicas("maxReplicaCount", 100),
            current_replicas,
            scalers,
            ..Default::default()
        }
    }
}

fn scaled_object_resource() -> ApiResource {
    ApiResource {
        group: "keda.sh".to_string(),
        version: "v1alpha1".to_string(),
        api_version: "keda.sh/v1alpha1".to_string(),
        kind: "ScaledObject".to_string(),
        plural: "scaledobjects".to_string(),
    }
}

/// Look up the autoscaler targeting `workload`: an HPA first, then a KEDA
/// ScaledObject, else a fixed single-replica `none` config.
///
/// Lookup failures (including a cluster without KEDA) degrade to the next
/// option.
pub async fn current_scaling_config(client: &Client, namespace: &str, workload: &str) -> ScalingConfig {
    let hpas: Api<HorizontalPodAutoscaler> = Api::namespaced(client.clone(), namespace);
    match hpas.list(&ListParams::default()).await {
        Ok(list) => {
            if let Some(hpa) = list.items.iter().find(|h| {
                h.spec
                    .as_ref()
                    .is_some_and(|s| s.scale_target_ref.name == workload)
            }) {
                return ScalingConfig::from_hpa(hpa);
            }
        }
        Err(e) => debug!("Could not list HPAs in {}: {}", namespace, e),
    }

    let scaled_objects: Api<DynamicObject> =
        Api::namespaced_with(client.clone(), namespace, &scaled_object_resource());
    match scaled_objects.list(&ListParams::default()).await {
        Ok(list) => {
            if let Some(object) = list.items.iter().find(|o| {
                o.data["spec"]["scaleTargetRef"]["name"].as_str() == Some(workload)
            }) {
                let current = deployment_replicas(client, namespace, workload).await.unwrap_or(0);
                return ScalingConfig::from_scaled_object(object, current);
            }
        }
        Err(e) => debug!("Could not list KEDA ScaledObjects in {}: {}", namespace, e),
    }

    ScalingConfig::default()
}

async fn deployment_replicas(client: &Client, namespace: &str, name: &str) -> Option<i32> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    deployments.get(name).await.ok()?.status?.replicas
}
