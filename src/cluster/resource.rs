//! Uniform view over typed and untyped Kubernetes objects.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Event, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::Resource;
use kube::api::DynamicObject;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::gatherer::GatherError;

/// A fetched object: a typed built-in, or a generic document for anything
/// the crate has no schema for.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum KubeObject {
    Deployment(Deployment),
    Pod(Pod),
    Service(Service),
    ConfigMap(ConfigMap),
    Secret(Secret),
    StatefulSet(StatefulSet),
    DaemonSet(DaemonSet),
    Ingress(Ingress),
    HorizontalPodAutoscaler(HorizontalPodAutoscaler),
    Event(Event),
    Dynamic(DynamicObject),
}

impl KubeObject {
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Deployment(o) => &o.metadata,
            Self::Pod(o) => &o.metadata,
            Self::Service(o) => &o.metadata,
            Self::ConfigMap(o) => &o.metadata,
            Self::Secret(o) => &o.metadata,
            Self::StatefulSet(o) => &o.metadata,
            Self::DaemonSet(o) => &o.metadata,
            Self::Ingress(o) => &o.metadata,
            Self::HorizontalPodAutoscaler(o) => &o.metadata,
            Self::Event(o) => &o.metadata,
            Self::Dynamic(o) => &o.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Deployment(_) => Deployment::KIND,
            Self::Pod(_) => Pod::KIND,
            Self::Service(_) => Service::KIND,
            Self::ConfigMap(_) => ConfigMap::KIND,
            Self::Secret(_) => Secret::KIND,
            Self::StatefulSet(_) => StatefulSet::KIND,
            Self::DaemonSet(_) => DaemonSet::KIND,
            Self::Ingress(_) => Ingress::KIND,
            Self::HorizontalPodAutoscaler(_) => HorizontalPodAutoscaler::KIND,
            Self::Event(_) => Event::KIND,
            Self::Dynamic(o) => o.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("Unknown"),
        }
    }

    /// Labels selecting this object's pods, if it selects any.
    ///
    /// Typed workloads use `spec.selector`; generic documents are probed at
    /// `spec.selector.matchLabels`. Empty selectors count as none.
    pub fn pod_selector(&self) -> Option<BTreeMap<String, String>> {
        let labels = match self {
            Self::Deployment(o) => match_labels(&o.spec.as_ref()?.selector),
            Self::StatefulSet(o) => match_labels(&o.spec.as_ref()?.selector),
            Self::DaemonSet(o) => match_labels(&o.spec.as_ref()?.selector),
            Self::Dynamic(o) => o
                .data
                .get("spec")?
                .get("selector")?
                .get("matchLabels")?
                .as_object()?
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect(),
            _ => return None,
        };

        (!labels.is_empty()).then_some(labels)
    }

    /// Drop secret payloads. Everything else passes through unchanged.
    pub fn redacted(self) -> Self {
        match self {
            Self::Secret(mut secret) => {
                secret.data = None;
                secret.string_data = None;
                Self::Secret(secret)
            }
            Self::Dynamic(mut object) if object.types.as_ref().is_some_and(|t| t.kind == Secret::KIND) => {
                if let Some(fields) = object.data.as_object_mut() {
                    fields.remove("data");
                    fields.remove("stringData");
                }
                Self::Dynamic(object)
            }
            other => other,
        }
    }
}

fn match_labels(selector: &LabelSelector) -> BTreeMap<String, String> {
    selector.match_labels.clone().unwrap_or_default()
}

/// Render labels as a `k=v,k2=v2` selector string.
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// A user-supplied `type/name` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
}

impl FromStr for ResourceRef {
    type Err = GatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [kind, name] if !kind.is_empty() && !name.is_empty() => Ok(Self {
                kind: kind.to_string(),
                name: name.to_string(),
            }),
            _ => Err(GatherError::InvalidReference(s.to_string())),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}
