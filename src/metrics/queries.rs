//! PromQL catalog for workload metrics.
//!
//! Templates use `RESOURCE_NAME` and `NAMESPACE` placeholders. Pods are
//! matched by name prefix, so a deployment's pods are covered by its name.

/// Below this many samples the CPU and memory series are retried with the
/// broader fallback query.
pub const SPARSE_SAMPLE_THRESHOLD: usize = 10;

/// Lookback of the fallback query, in hours.
pub const FALLBACK_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricQuery {
    pub name: &'static str,
    pub unit: &'static str,
    pub template: &'static str,
    /// Less selective query used when the primary one returns sparse data
    pub fallback: Option<&'static str>,
}

impl MetricQuery {
    pub fn render(&self, resource: &str, namespace: &str) -> String {
        fill(self.template, resource, namespace)
    }

    pub fn render_fallback(&self, resource: &str, namespace: &str) -> Option<String> {
        self.fallback.map(|t| fill(t, resource, namespace))
    }
}

fn fill(template: &str, resource: &str, namespace: &str) -> String {
    template
        .replace("RESOURCE_NAME", resource)
        .replace("NAMESPACE", namespace)
}

pub const CATALOG: &[MetricQuery] = &[
    MetricQuery {
        name: "cpu_utilization",
        unit: "percent",
        template: r#"avg(rate(container_cpu_usage_seconds_total{pod=~"RESOURCE_NAME.*", namespace="NAMESPACE", container!="", container!="POD"}[5m])) * 100"#,
        fallback: Some(r#"avg(rate(container_cpu_usage_seconds_total{pod=~"RESOURCE_NAME.*", namespace="NAMESPACE"}[1m])) * 100"#),
    },
    MetricQuery {
        name: "cpu_requests",
        unit: "cores",
        template: r#"avg(kube_pod_container_resource_requests{pod=~"RESOURCE_NAME.*", namespace="NAMESPACE", resource="cpu"})"#,
        fallback: None,
    },
    MetricQuery {
        name: "cpu_limits",
        unit: "cores",
        template: r#"avg(kube_pod_container_resource_limits{pod=~"RESOURCE_NAME.*", namespace="NAMESPACE", resource="cpu"})"#,
        fallback: None,
    },
    MetricQuery {
        name: "memory_utilization",
        unit: "MB",
        template: r#"avg(container_memory_usage_bytes{pod=~"RESOURCE_NAME.*", namespace="NAMESPACE", container!="", container!="POD"}) / 1024 / 1024"#,
        fallback: Some(r#"avg(container_memory_usage_bytes{pod=~"RESOURCE_NAME.*", namespace="NAMESPACE"}) / 1024 / 1024"#),
    },
    MetricQuery {
        name: "memory_requests",
        unit: "MB",
        template: r#"avg(kube_pod_container_resource_requests{pod=~"RESOURCE_NAME.*", namespace="NAMESPACE", resource="memory"}) / 1024 / 1024"#,
        fallback: None,
    },
    MetricQuery {
        name: "memory_limits",
        unit: "MB",
        template: r#"avg(kube_pod_container_resource_limits{pod=~"RESOURCE_NAME.*", namespace="NAMESPACE", resource="memory"}) / 1024 / 1024"#,
        fallback: None,
    },
    MetricQuery {
        name: "pod_replicas",
        unit: "count",
        template: r#"kube_deployment_status_replicas{deployment="RESOURCE_NAME", namespace="NAMESPACE"}"#,
        fallback: None,
    },
    MetricQuery {
        name: "pod_available",
        unit: "count",
        template: r#"kube_deployment_status_replicas_available{deployment="RESOURCE_NAME", namespace="NAMESPACE"}"#,
        fallback: None,
    },
];

pub fn find(name: &str) -> Option<&'static MetricQuery> {
    CATALOG.iter().find(|q| q.name == name)
}
