//! Resource Discovery Index.
//!
//! Resolves the resource type a user typed ("deploy", "sts", "svc", or the
//! name of some CRD) to the API coordinate needed to talk to it. Well-known
//! built-in types come from a static table; anything else is looked up in the
//! cluster's discovery API and cached for the lifetime of the index.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};
use kube::{Client, discovery::ApiResource};
use log::{debug, warn};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Resource type '{token}' not found in the cluster")]
    NotFound { token: String },

    #[error("Discovery API unavailable: {0}")]
    Unavailable(String),
}

/// Fully qualified location of a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceCoordinate {
    /// API group, empty for the core group
    pub group: String,
    pub version: String,
    /// Plural resource name as used in API paths
    pub resource: String,
    pub kind: String,
    pub namespaced: bool,
}

impl ResourceCoordinate {
    fn new(group: &str, version: &str, resource: &str, kind: &str, namespaced: bool) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
            kind: kind.to_string(),
            namespaced,
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Coordinate in the shape the dynamic client expects.
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.resource.clone(),
        }
    }
}

/// Built-in types served by typed clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Deployment,
    Pod,
    Service,
    ConfigMap,
    Secret,
    StatefulSet,
    DaemonSet,
    Ingress,
    HorizontalPodAutoscaler,
}

impl BuiltinKind {
    /// Match a lower-cased type token against the built-in aliases.
    pub fn from_token(token: &str) -> Option<Self> {
        let kind = match token {
            "deployment" | "deployments" | "deploy" => Self::Deployment,
            "pod" | "pods" | "po" => Self::Pod,
            "service" | "services" | "svc" => Self::Service,
            "configmap" | "configmaps" | "cm" => Self::ConfigMap,
            "secret" | "secrets" => Self::Secret,
            "statefulset" | "statefulsets" | "sts" => Self::StatefulSet,
            "daemonset" | "daemonsets" | "ds" => Self::DaemonSet,
            "ingress" | "ingresses" | "ing" => Self::Ingress,
            "hpa" | "horizontalpodautoscaler" | "horizontalpodautoscalers" => {
                Self::HorizontalPodAutoscaler
            }
            _ => return None,
        };
        Some(kind)
    }

    pub fn coordinate(self) -> ResourceCoordinate {
        match self {
            Self::Deployment => ResourceCoordinate::new("apps", "v1", "deployments", "Deployment", true),
            Self::Pod => ResourceCoordinate::new("", "v1", "pods", "Pod", true),
            Self::Service => ResourceCoordinate::new("", "v1", "services", "Service", true),
            Self::ConfigMap => ResourceCoordinate::new("", "v1", "configmaps", "ConfigMap", true),
            Self::Secret => ResourceCoordinate::new("", "v1", "secrets", "Secret", true),
            Self::StatefulSet => ResourceCoordinate::new("apps", "v1", "statefulsets", "StatefulSet", true),
            Self::DaemonSet => ResourceCoordinate::new("apps", "v1", "daemonsets", "DaemonSet", true),
            Self::Ingress => {
                ResourceCoordinate::new("networking.k8s.io", "v1", "ingresses", "Ingress", true)
            }
            Self::HorizontalPodAutoscaler => ResourceCoordinate::new(
                "autoscaling",
                "v2",
                "horizontalpodautoscalers",
                "HorizontalPodAutoscaler",
                true,
            ),
        }
    }
}

/// A group/version whose resource list could not be fetched.
#[derive(Debug, Clone)]
pub struct DiscoveryFailure {
    pub group_version: String,
    pub message: String,
}

/// Preferred-version resource lists, possibly incomplete.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredResources {
    pub lists: Vec<APIResourceList>,
    pub failures: Vec<DiscoveryFailure>,
}

/// Source of discovery data.
pub trait DiscoveryBackend: Send + Sync {
    /// Resource lists for every group at its preferred version.
    ///
    /// Group-level failures are reported in `failures` next to whatever
    /// could be listed; only a total failure is an error.
    fn preferred_resources(
        &self,
    ) -> impl Future<Output = Result<DiscoveredResources, DiscoveryError>> + Send;
}

/// Discovery backed by the API server.
#[derive(Clone)]
pub struct KubeDiscovery {
    client: Client,
}

impl KubeDiscovery {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl DiscoveryBackend for KubeDiscovery {
    async fn preferred_resources(&self) -> Result<DiscoveredResources, DiscoveryError> {
        let mut discovered = DiscoveredResources::default();

        match self.client.list_core_api_versions().await {
            Ok(core) => {
                if let Some(version) = core.versions.first() {
                    match self.client.list_core_api_resources(version).await {
                        Ok(list) => discovered.lists.push(list),
                        Err(e) => discovered.failures.push(DiscoveryFailure {
                            group_version: version.clone(),
                            message: e.to_string(),
                        }),
                    }
                }
            }
            Err(e) => discovered.failures.push(DiscoveryFailure {
                group_version: "v1".to_string(),
                message: e.to_string(),
            }),
        }

        let groups = match self.client.list_api_groups().await {
            Ok(groups) => groups.groups,
            Err(e) if discovered.lists.is_empty() => {
                return Err(DiscoveryError::Unavailable(e.to_string()));
            }
            Err(e) => {
                discovered.failures.push(DiscoveryFailure {
                    group_version: "/apis".to_string(),
                    message: e.to_string(),
                });
                Vec::new()
            }
        };

        for group in groups {
            let Some(group_version) = group
                .preferred_version
                .as_ref()
                .or_else(|| group.versions.first())
                .map(|v| v.group_version.clone())
            else {
                continue;
            };

            match self.client.list_api_group_resources(&group_version).await {
                Ok(list) => discovered.lists.push(list),
                Err(e) => discovered.failures.push(DiscoveryFailure {
                    group_version,
                    message: e.to_string(),
                }),
            }
        }

        if discovered.lists.is_empty() && !discovered.failures.is_empty() {
            let reasons: Vec<String> = discovered
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.group_version, f.message))
                .collect();
            return Err(DiscoveryError::Unavailable(reasons.join("; ")));
        }

        Ok(discovered)
    }
}

/// Resolves resource type tokens to coordinates.
///
/// One index is built per command invocation and shared by reference. Cached
/// coordinates are never invalidated.
pub struct DiscoveryIndex<B = KubeDiscovery> {
    backend: B,
    cache: RwLock<HashMap<String, ResourceCoordinate>>,
}

impl<B: DiscoveryBackend> DiscoveryIndex<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a resource type token such as `deploy` or `certificates`.
    pub async fn resolve(&self, token: &str) -> Result<ResourceCoordinate, DiscoveryError> {
        let token = token.to_lowercase();

        if let Some(kind) = BuiltinKind::from_token(&token) {
            return Ok(kind.coordinate());
        }

        let cached = self.cache.read().get(&token).cloned();
        if let Some(coordinate) = cached {
            return Ok(coordinate);
        }

        // Two callers racing on the same token both scan; the later insert wins.
        let discovered = self.backend.preferred_resources().await?;
        for failure in &discovered.failures {
            warn!(
                "Discovery for {} failed, continuing with partial results: {}",
                failure.group_version, failure.message
            );
        }

        let coordinate = find_coordinate(&discovered.lists, &token)
            .ok_or_else(|| DiscoveryError::NotFound { token: token.clone() })?;

        debug!(
            "Resolved '{}' to {}/{}",
            token,
            coordinate.api_version(),
            coordinate.resource
        );
        self.cache.write().insert(token, coordinate.clone());
        Ok(coordinate)
    }

    /// Number of discovered (non built-in) coordinates held in the cache.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}

/// First resource in discovery order whose plural, singular or short name
/// equals `token`, ignoring case.
pub fn find_coordinate(lists: &[APIResourceList], token: &str) -> Option<ResourceCoordinate> {
    lists.iter().find_map(|list| {
        let (group, version) = split_group_version(&list.group_version);
        list.resources
            .iter()
            .filter(|r| !r.name.contains('/'))
            .find(|r| matches_token(r, token))
            .map(|r| ResourceCoordinate::new(group, version, &r.name, &r.kind, r.namespaced))
    })
}

fn matches_token(resource: &APIResource, token: &str) -> bool {
    resource.name.eq_ignore_ascii_case(token)
        || resource.singular_name.eq_ignore_ascii_case(token)
        || resource
            .short_names
            .iter()
            .flatten()
            .any(|short| short.eq_ignore_ascii_case(token))
}

fn split_group_version(group_version: &str) -> (&str, &str) {
    match group_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", group_version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticBackend {
        discovered: DiscoveredResources,
        calls: AtomicUsize,
    }

    impl StaticBackend {
        fn new(lists: Vec<APIResourceList>) -> Self {
            Self {
                discovered: DiscoveredResources {
                    lists,
                    failures: Vec::new(),
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl DiscoveryBackend for StaticBackend {
        async fn preferred_resources(&self) -> Result<DiscoveredResources, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.discovered.clone())
        }
    }

    fn resource(name: &str, singular: &str, kind: &str, short: &[&str]) -> APIResource {
        APIResource {
            name: name.to_string(),
            singular_name: singular.to_string(),
            kind: kind.to_string(),
            namespaced: true,
            short_names: if short.is_empty() {
                None
            } else {
                Some(short.iter().map(|s| s.to_string()).collect())
            },
            verbs: vec!["get".to_string(), "list".to_string()],
            ..Default::default()
        }
    }

    fn list(group_version: &str, resources: Vec<APIResource>) -> APIResourceList {
        APIResourceList {
            group_version: group_version.to_string(),
            resources,
        }
    }

    fn cluster_lists() -> Vec<APIResourceList> {
        vec![
            list(
                "v1",
                vec![
                    resource("pods", "pod", "Pod", &["po"]),
                    resource("pods/log", "", "Pod", &[]),
                ],
            ),
            list(
                "cert-manager.io/v1",
                vec![resource("certificates", "certificate", "Certificate", &["cert", "certs"])],
            ),
            list(
                "monitoring.coreos.com/v1",
                vec![resource("servicemonitors", "servicemonitor", "ServiceMonitor", &["smon"])],
            ),
        ]
    }

    #[tokio::test]
    async fn test_builtin_aliases_resolve_to_same_coordinate() {
        let index = DiscoveryIndex::new(StaticBackend::new(Vec::new()));
        let groups: &[&[&str]] = &[
            &["deploy", "deployment", "deployments", "DEPLOY"],
            &["pod", "pods", "po"],
            &["svc", "service", "services"],
            &["cm", "configmap", "configmaps"],
            &["secret", "secrets"],
            &["sts", "statefulset", "statefulsets"],
            &["ds", "daemonset", "daemonsets"],
            &["ing", "ingress", "ingresses"],
            &["hpa", "horizontalpodautoscaler", "horizontalpodautoscalers"],
        ];

        for aliases in groups {
            let expected = index.resolve(aliases[0]).await.unwrap();
            for alias in &aliases[1..] {
                assert_eq!(index.resolve(alias).await.unwrap(), expected, "alias {}", alias);
            }
        }

        assert_eq!(index.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolves_crd_by_any_name() {
        let index = DiscoveryIndex::new(StaticBackend::new(cluster_lists()));

        for token in ["certificates", "Certificate", "cert", "CERTS"] {
            let coordinate = index.resolve(token).await.unwrap();
            assert_eq!(coordinate.group, "cert-manager.io");
            assert_eq!(coordinate.version, "v1");
            assert_eq!(coordinate.resource, "certificates");
            assert_eq!(coordinate.kind, "Certificate");
        }
    }

    #[tokio::test]
    async fn test_match_in_last_group_is_found() {
        let index = DiscoveryIndex::new(StaticBackend::new(cluster_lists()));
        let coordinate = index.resolve("smon").await.unwrap();
        assert_eq!(coordinate.api_version(), "monitoring.coreos.com/v1");
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let index = DiscoveryIndex::new(StaticBackend::new(cluster_lists()));
        let err = index.resolve("widgets").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::NotFound { ref token } if token == "widgets"));
        assert_eq!(index.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_resolution_is_cached() {
        let index = DiscoveryIndex::new(StaticBackend::new(cluster_lists()));

        index.resolve("cert").await.unwrap();
        index.resolve("cert").await.unwrap();
        index.resolve("CERT").await.unwrap();

        assert_eq!(index.backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(index.cached_len(), 1);
    }

    #[tokio::test]
    async fn test_partial_discovery_still_resolves() {
        let backend = StaticBackend {
            discovered: DiscoveredResources {
                lists: cluster_lists(),
                failures: vec![DiscoveryFailure {
                    group_version: "metrics.k8s.io/v1beta1".to_string(),
                    message: "service unavailable".to_string(),
                }],
            },
            calls: AtomicUsize::new(0),
        };
        let index = DiscoveryIndex::new(backend);

        let coordinate = index.resolve("certificate").await.unwrap();
        assert_eq!(coordinate.kind, "Certificate");
    }

    #[test]
    fn test_subresources_are_ignored() {
        let lists = vec![list("v1", vec![resource("pods/log", "log", "Pod", &[])])];
        assert!(find_coordinate(&lists, "log").is_none());
    }

    #[test]
    fn test_core_group_api_version() {
        let coordinate = BuiltinKind::Pod.coordinate();
        assert_eq!(coordinate.api_version(), "v1");
        let api_resource = BuiltinKind::Ingress.coordinate().api_resource();
        assert_eq!(api_resource.api_version, "networking.k8s.io/v1");
        assert_eq!(api_resource.plural, "ingresses");
    }
}
