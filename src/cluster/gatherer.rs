//! Resource Gatherer.
//!
//! Fetches the resources a diagnosis needs. Single bad references never fail
//! the whole gather: they become warnings next to whatever could be fetched.

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Event, Node, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    Client,
    api::{Api, DynamicObject, ListParams},
};
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;

use super::discovery::{BuiltinKind, DiscoveryBackend, DiscoveryError, DiscoveryIndex, KubeDiscovery};
use super::resource::{KubeObject, ResourceRef, label_selector};

#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    #[error("Invalid resource reference '{0}': expected TYPE/NAME")]
    InvalidReference(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Failed to fetch {reference}: {source}")]
    Api {
        reference: String,
        #[source]
        source: kube::Error,
    },

    #[error("Kubernetes API request failed: {0}")]
    Kube(#[from] kube::Error),
}

/// One entry of a gather result.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GatheredResource {
    Object(KubeObject),
    List(Vec<KubeObject>),
}

#[derive(Debug, Default, Serialize)]
pub struct GatherResult {
    /// Keyed by `type/name`, `type/name_pods`, or a collection name in
    /// namespace-wide mode.
    pub resources: BTreeMap<String, GatheredResource>,
    #[serde(skip)]
    pub warnings: Vec<String>,
}

impl GatherResult {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn insert_list(&mut self, key: String, objects: Vec<KubeObject>) {
        let objects = objects.into_iter().map(KubeObject::redacted).collect();
        self.resources.insert(key, GatheredResource::List(objects));
    }
}

/// Collections listed in namespace-wide mode, with their result keys.
const NAMESPACE_COLLECTIONS: &[(BuiltinKind, &str)] = &[
    (BuiltinKind::Deployment, "deployments"),
    (BuiltinKind::Pod, "pods"),
    (BuiltinKind::Service, "services"),
    (BuiltinKind::ConfigMap, "configmaps"),
    (BuiltinKind::Ingress, "ingresses"),
    (BuiltinKind::HorizontalPodAutoscaler, "hpas"),
];

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub name: String,
    /// "Ready", "NotReady" or "Unknown"
    pub status: String,
    pub capacity: BTreeMap<String, String>,
    pub allocatable: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub nodes: Vec<NodeSummary>,
    pub total_nodes: usize,
    pub timestamp: DateTime<Utc>,
}

pub struct ResourceGatherer<'a, B = KubeDiscovery> {
    client: Client,
    index: &'a DiscoveryIndex<B>,
}

impl<'a, B: DiscoveryBackend> ResourceGatherer<'a, B> {
    pub fn new(client: Client, index: &'a DiscoveryIndex<B>) -> Self {
        Self { client, index }
    }

    /// Gather named references, or every common collection when `all` is set.
    ///
    /// Namespace events are always appended when there are any.
    pub async fn gather(&self, namespace: &str, references: &[String], all: bool) -> GatherResult {
        let mut result = GatherResult::default();

        if all {
            for (kind, key) in NAMESPACE_COLLECTIONS {
                match self.list_collection(*kind, namespace).await {
                    Ok(objects) if objects.is_empty() => {}
                    Ok(objects) => result.insert_list(key.to_string(), objects),
                    Err(e) => result.warn(format!("Failed to list {} in {}: {}", key, namespace, e)),
                }
            }
        } else {
            for raw in references {
                self.gather_reference(namespace, raw, &mut result).await;
            }
        }

        match self.list_in::<Event>(namespace, &ListParams::default()).await {
            Ok(events) if events.is_empty() => {}
            Ok(events) => {
                let events = events.into_iter().map(KubeObject::Event).collect();
                result.insert_list("events".to_string(), events);
            }
            Err(e) => result.warn(format!("Failed to list events in {}: {}", namespace, e)),
        }

        result
    }

    async fn gather_reference(&self, namespace: &str, raw: &str, result: &mut GatherResult) {
        let reference: ResourceRef = match raw.parse() {
            Ok(reference) => reference,
            Err(e) => {
                result.warn(format!("Skipping {}", e));
                return;
            }
        };

        let object = match self.fetch(namespace, &reference).await {
            Ok(object) => object.redacted(),
            Err(e) => {
                result.warn(format!("Skipping {}: {}", raw, e));
                return;
            }
        };

        if let Some(selector) = object.pod_selector() {
            match self.pods_matching(namespace, &selector).await {
                // Attached even when empty.
                Ok(pods) => result.insert_list(format!("{}_pods", raw), pods),
                Err(e) => debug!("Could not list pods for {}: {}", raw, e),
            }
        }

        result
            .resources
            .insert(raw.to_string(), GatheredResource::Object(object));
    }

    /// Fetch one object: typed client first, then discovery plus the
    /// dynamic client.
    pub async fn fetch(&self, namespace: &str, reference: &ResourceRef) -> Result<KubeObject, GatherError> {
        let token = reference.kind.to_lowercase();

        if let Some(kind) = BuiltinKind::from_token(&token) {
            match self.get_typed(kind, namespace, &reference.name).await {
                Ok(object) => return Ok(object),
                Err(e) => debug!("Typed lookup of {} failed, trying dynamic client: {}", reference, e),
            }
        }

        let coordinate = self.index.resolve(&token).await?;
        let api_resource = coordinate.api_resource();
        let api: Api<DynamicObject> = if coordinate.namespaced {
            Api::namespaced_with(self.client.clone(), namespace, &api_resource)
        } else {
            Api::all_with(self.client.clone(), &api_resource)
        };

        let object = api.get(&reference.name).await.map_err(|source| GatherError::Api {
            reference: reference.to_string(),
            source,
        })?;

        Ok(KubeObject::Dynamic(object))
    }

    /// Pods in `namespace` matching the given labels.
    pub async fn pods_matching(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<KubeObject>, GatherError> {
        let params = ListParams::default().labels(&label_selector(labels));
        let pods = self.list_in::<Pod>(namespace, &params).await?;
        Ok(pods.into_iter().map(KubeObject::Pod).collect())
    }

    /// Names of every deployment in the namespace.
    pub async fn deployment_names(&self, namespace: &str) -> Result<Vec<String>, GatherError> {
        let deployments = self.list_in::<Deployment>(namespace, &ListParams::default()).await?;
        Ok(deployments
            .into_iter()
            .filter_map(|d| d.metadata.name)
            .collect())
    }

    /// Node readiness and capacity across the cluster.
    pub async fn cluster_summary(&self) -> Result<ClusterSummary, GatherError> {
        let nodes = Api::<Node>::all(self.client.clone())
            .list(&ListParams::default())
            .await?
            .items;

        let nodes: Vec<NodeSummary> = nodes.iter().map(summarize_node).collect();
        Ok(ClusterSummary {
            total_nodes: nodes.len(),
            nodes,
            timestamp: Utc::now(),
        })
    }

    async fn get_typed(&self, kind: BuiltinKind, namespace: &str, name: &str) -> Result<KubeObject, kube::Error> {
        Ok(match kind {
            BuiltinKind::Deployment => KubeObject::Deployment(self.get_in::<Deployment>(namespace, name).await?),
            BuiltinKind::Pod => KubeObject::Pod(self.get_in::<Pod>(namespace, name).await?),
            BuiltinKind::Service => KubeObject::Service(self.get_in::<Service>(namespace, name).await?),
            BuiltinKind::ConfigMap => KubeObject::ConfigMap(self.get_in::<ConfigMap>(namespace, name).await?),
            BuiltinKind::Secret => KubeObject::Secret(self.get_in::<Secret>(namespace, name).await?),
            BuiltinKind::StatefulSet => KubeObject::StatefulSet(self.get_in::<StatefulSet>(namespace, name).await?),
            BuiltinKind::DaemonSet => KubeObject::DaemonSet(self.get_in::<DaemonSet>(namespace, name).await?),
            BuiltinKind::Ingress => KubeObject::Ingress(self.get_in::<Ingress>(namespace, name).await?),
            BuiltinKind::HorizontalPodAutoscaler => KubeObject::HorizontalPodAutoscaler(
                self.get_in::<HorizontalPodAutoscaler>(namespace, name).await?,
            ),
        })
    }

    async fn list_collection(&self, kind: BuiltinKind, namespace: &str) -> Result<Vec<KubeObject>, kube::Error> {
        let lp = ListParams::default();
        Ok(match kind {
            BuiltinKind::Deployment => wrap(self.list_in::<Deployment>(namespace, &lp).await?, KubeObject::Deployment),
            BuiltinKind::Pod => wrap(self.list_in::<Pod>(namespace, &lp).await?, KubeObject::Pod),
            BuiltinKind::Service => wrap(self.list_in::<Service>(namespace, &lp).await?, KubeObject::Service),
            BuiltinKind::ConfigMap => wrap(self.list_in::<ConfigMap>(namespace, &lp).await?, KubeObject::ConfigMap),
            BuiltinKind::Secret => wrap(self.list_in::<Secret>(namespace, &lp).await?, KubeObject::Secret),
            BuiltinKind::StatefulSet => wrap(self.list_in::<StatefulSet>(namespace, &lp).await?, KubeObject::StatefulSet),
            BuiltinKind::DaemonSet => wrap(self.list_in::<DaemonSet>(namespace, &lp).await?, KubeObject::DaemonSet),
            BuiltinKind::Ingress => wrap(self.list_in::<Ingress>(namespace, &lp).await?, KubeObject::Ingress),
            BuiltinKind::HorizontalPodAutoscaler => wrap(
                self.list_in::<HorizontalPodAutoscaler>(namespace, &lp).await?,
                KubeObject::HorizontalPodAutoscaler,
            ),
        })
    }

    async fn get_in<K>(&self, namespace: &str, name: &str) -> Result<K, kube::Error>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        Api::<K>::namespaced(self.client.clone(), namespace).get(name).await
    }

    async fn list_in<K>(&self, namespace: &str, params: &ListParams) -> Result<Vec<K>, kube::Error>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        Ok(Api::<K>::namespaced(self.client.clone(), namespace)
            .list(params)
            .await?
            .items)
    }
}

fn wrap<K>(items: Vec<K>, variant: fn(K) -> KubeObject) -> Vec<KubeObject> {
    items.into_iter().map(variant).collect()
}

fn summarize_node(node: &Node) -> NodeSummary {
    let status = node.status.as_ref();

    let ready = status
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"));
    let readiness = match ready.map(|c| c.status.as_str()) {
        Some("True") => "Ready",
        Some("False") => "NotReady",
        _ => "Unknown",
    };

    NodeSummary {
        name: node.metadata.name.clone().unwrap_or_default(),
        status: readiness.to_string(),
        capacity: quantities(status.and_then(|s| s.capacity.as_ref())),
        allocatable: quantities(status.and_then(|s| s.allocatable.as_ref())),
    }
}

fn quantities(map: Option<&BTreeMap<String, Quantity>>) -> BTreeMap<String, String> {
    map.map(|m| m.iter().map(|(k, q)| (k.clone(), q.0.clone())).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus};

    fn node(name: &str, ready: Option<&str>) -> Node {
        let mut node = Node::default();
        node.metadata.name = Some(name.to_string());
        node.status = Some(NodeStatus {
            conditions: ready.map(|status| {
                vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: status.to_string(),
                    ..Default::default()
                }]
            }),
            capacity: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity("4".to_string())),
                ("memory".to_string(), Quantity("16Gi".to_string())),
            ])),
            ..Default::default()
        });
        node
    }

    #[test]
    fn test_node_readiness() {
        assert_eq!(summarize_node(&node("a", Some("True"))).status, "Ready");
        assert_eq!(summarize_node(&node("b", Some("False"))).status, "NotReady");
        assert_eq!(summarize_node(&node("c", Some("Unknown"))).status, "Unknown");
        assert_eq!(summarize_node(&node("d", None)).status, "Unknown");
    }

    #[test]
    fn test_node_quantities() {
        let summary = summarize_node(&node("a", Some("True")));
        assert_eq!(summary.name, "a");
        assert_eq!(summary.capacity["memory"], "16Gi");
        assert!(summary.allocatable.is_empty());
    }
}
