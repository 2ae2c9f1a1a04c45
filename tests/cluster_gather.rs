use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{Value, json};

use kubectl_ai::cluster::{
    self, DiscoveryIndex, GatheredResource, KubeDiscovery, ResourceGatherer,
};
use kubectl_ai::metrics::PrometheusError;
use kubectl_ai::metrics::prometheus_client::{
    NAMESPACES, SERVICE_NAMES, ServiceLocation, detect_service,
};

/// Integration tests for resource gathering against a fake API server

fn client_for(server: &ServerGuard) -> kube::Client {
    cluster::install_crypto_provider();
    let uri = server.url().parse::<http::Uri>().unwrap();
    kube::Client::try_from(kube::Config::new(uri)).unwrap()
}

async fn mock_json(server: &mut ServerGuard, path: &str, body: Value) -> Mock {
    server
        .mock("GET", path)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

async fn mock_not_found(server: &mut ServerGuard, path: &str, message: &str) -> Mock {
    server
        .mock("GET", path)
        .match_query(Matcher::Any)
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "kind": "Status",
                "apiVersion": "v1",
                "status": "Failure",
                "message": message,
                "reason": "NotFound",
                "code": 404
            })
            .to_string(),
        )
        .create_async()
        .await
}

fn list(kind: &str, api_version: &str, items: Vec<Value>) -> Value {
    json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": {"resourceVersion": "1"},
        "items": items,
    })
}

fn deployment(name: &str) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": name, "namespace": "shop"},
        "spec": {
            "replicas": 2,
            "selector": {"matchLabels": {"app": name}},
            "template": {"metadata": {"labels": {"app": name}}}
        },
        "status": {"replicas": 2, "readyReplicas": 1}
    })
}

fn pod(name: &str, app: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": name, "namespace": "shop", "labels": {"app": app}},
        "status": {"phase": "Running"}
    })
}

fn event(name: &str, reason: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Event",
        "metadata": {"name": name, "namespace": "shop"},
        "involvedObject": {"kind": "Pod", "name": "web-1", "namespace": "shop"},
        "reason": reason,
        "message": "Back-off restarting failed container",
        "type": "Warning"
    })
}

async fn no_events(server: &mut ServerGuard) -> Mock {
    mock_json(
        server,
        "/api/v1/namespaces/shop/events",
        list("EventList", "v1", vec![]),
    )
    .await
}

#[tokio::test]
async fn test_gather_deployment_with_pods_and_events() {
    let mut server = Server::new_async().await;
    let _deployment = mock_json(
        &mut server,
        "/apis/apps/v1/namespaces/shop/deployments/web",
        deployment("web"),
    )
    .await;
    let _pods = mock_json(
        &mut server,
        "/api/v1/namespaces/shop/pods",
        list("PodList", "v1", vec![pod("web-1", "web"), pod("web-2", "web")]),
    )
    .await;
    let _events = mock_json(
        &mut server,
        "/api/v1/namespaces/shop/events",
        list("EventList", "v1", vec![event("web-1.abc", "BackOff")]),
    )
    .await;

    let client = client_for(&server);
    let index = DiscoveryIndex::new(KubeDiscovery::new(client.clone()));
    let gathered = ResourceGatherer::new(client, &index)
        .gather("shop", &["deploy/web".to_string()], false)
        .await;

    assert!(gathered.warnings.is_empty(), "{:?}", gathered.warnings);
    match &gathered.resources["deploy/web"] {
        GatheredResource::Object(object) => {
            assert_eq!(object.kind(), "Deployment");
            assert_eq!(object.name(), "web");
        }
        other => panic!("expected a single object, got {:?}", other),
    }
    match &gathered.resources["deploy/web_pods"] {
        GatheredResource::List(pods) => assert_eq!(pods.len(), 2),
        other => panic!("expected a pod list, got {:?}", other),
    }
    match &gathered.resources["events"] {
        GatheredResource::List(events) => assert_eq!(events.len(), 1),
        other => panic!("expected an event list, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_references_become_warnings() {
    let mut server = Server::new_async().await;
    let _deployment = mock_json(
        &mut server,
        "/apis/apps/v1/namespaces/shop/deployments/web",
        deployment("web"),
    )
    .await;
    let _pods = mock_json(
        &mut server,
        "/api/v1/namespaces/shop/pods",
        list("PodList", "v1", vec![]),
    )
    .await;
    let _missing = mock_not_found(
        &mut server,
        "/apis/apps/v1/namespaces/shop/deployments/ghost",
        "deployments.apps \"ghost\" not found",
    )
    .await;
    let _service = mock_json(
        &mut server,
        "/api/v1/namespaces/shop/services/web",
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "web", "namespace": "shop"},
            "spec": {"selector": {"app": "web"}, "ports": [{"port": 80}]}
        }),
    )
    .await;
    let _events = no_events(&mut server).await;

    let client = client_for(&server);
    let index = DiscoveryIndex::new(KubeDiscovery::new(client.clone()));
    let references = vec![
        "deploy/web".to_string(),
        "not-a-reference".to_string(),
        "svc/web".to_string(),
        "deploy/ghost".to_string(),
    ];
    let gathered = ResourceGatherer::new(client, &index)
        .gather("shop", &references, false)
        .await;

    let keys: Vec<&str> = gathered.resources.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["deploy/web", "deploy/web_pods", "svc/web"]);
    match &gathered.resources["deploy/web_pods"] {
        GatheredResource::List(pods) => assert!(pods.is_empty()),
        other => panic!("expected an empty pod list, got {:?}", other),
    }
    assert_eq!(gathered.warnings.len(), 2, "{:?}", gathered.warnings);
    assert!(gathered.warnings.iter().any(|w| w.contains("not-a-reference")));
    assert!(gathered.warnings.iter().any(|w| w.contains("deploy/ghost")));
}

#[tokio::test]
async fn test_secret_values_are_redacted() {
    let mut server = Server::new_async().await;
    let _secret = mock_json(
        &mut server,
        "/api/v1/namespaces/shop/secrets/db-creds",
        json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": "db-creds", "namespace": "shop"},
            "type": "Opaque",
            "data": {"password": "aHVudGVyMg=="}
        }),
    )
    .await;
    let _events = no_events(&mut server).await;

    let client = client_for(&server);
    let index = DiscoveryIndex::new(KubeDiscovery::new(client.clone()));
    let gathered = ResourceGatherer::new(client, &index)
        .gather("shop", &["secret/db-creds".to_string()], false)
        .await;

    let rendered = serde_json::to_string(&gathered.resources).unwrap();
    assert!(rendered.contains("db-creds"));
    assert!(!rendered.contains("aHVudGVyMg=="));
    assert!(!gathered.resources.contains_key("events"));
}

#[tokio::test]
async fn test_custom_resource_resolved_through_discovery() {
    let mut server = Server::new_async().await;
    let _core_versions = mock_json(
        &mut server,
        "/api",
        json!({
            "kind": "APIVersions",
            "apiVersion": "v1",
            "versions": ["v1"],
            "serverAddressByClientCIDRs": []
        }),
    )
    .await;
    let _core_resources = mock_json(
        &mut server,
        "/api/v1",
        json!({
            "kind": "APIResourceList",
            "apiVersion": "v1",
            "groupVersion": "v1",
            "resources": [{
                "name": "pods",
                "singularName": "pod",
                "namespaced": true,
                "kind": "Pod",
                "verbs": ["get", "list"],
                "shortNames": ["po"]
            }]
        }),
    )
    .await;
    let _groups = mock_json(
        &mut server,
        "/apis",
        json!({
            "kind": "APIGroupList",
            "apiVersion": "v1",
            "groups": [{
                "name": "cert-manager.io",
                "versions": [{"groupVersion": "cert-manager.io/v1", "version": "v1"}],
                "preferredVersion": {"groupVersion": "cert-manager.io/v1", "version": "v1"}
            }]
        }),
    )
    .await;
    let _group_resources = mock_json(
        &mut server,
        "/apis/cert-manager.io/v1",
        json!({
            "kind": "APIResourceList",
            "apiVersion": "v1",
            "groupVersion": "cert-manager.io/v1",
            "resources": [
                {
                    "name": "certificates",
                    "singularName": "certificate",
                    "namespaced": true,
                    "kind": "Certificate",
                    "verbs": ["get", "list"],
                    "shortNames": ["cert", "certs"]
                },
                {
                    "name": "certificates/status",
                    "singularName": "",
                    "namespaced": true,
                    "kind": "Certificate",
                    "verbs": ["get"]
                }
            ]
        }),
    )
    .await;
    let _certificate = mock_json(
        &mut server,
        "/apis/cert-manager.io/v1/namespaces/shop/certificates/web-tls",
        json!({
            "apiVersion": "cert-manager.io/v1",
            "kind": "Certificate",
            "metadata": {"name": "web-tls", "namespace": "shop"},
            "spec": {"secretName": "web-tls", "dnsNames": ["shop.example.com"]}
        }),
    )
    .await;
    let _events = no_events(&mut server).await;

    let client = client_for(&server);
    let index = DiscoveryIndex::new(KubeDiscovery::new(client.clone()));
    let gathered = ResourceGatherer::new(client, &index)
        .gather("shop", &["cert/web-tls".to_string()], false)
        .await;

    assert!(gathered.warnings.is_empty(), "{:?}", gathered.warnings);
    match &gathered.resources["cert/web-tls"] {
        GatheredResource::Object(object) => {
            assert_eq!(object.kind(), "Certificate");
            assert_eq!(object.name(), "web-tls");
        }
        other => panic!("expected a single object, got {:?}", other),
    }
    assert_eq!(index.cached_len(), 1);
}

#[tokio::test]
async fn test_namespace_mode_skips_empty_collections() {
    let mut server = Server::new_async().await;
    let _deployments = mock_json(
        &mut server,
        "/apis/apps/v1/namespaces/shop/deployments",
        list("DeploymentList", "apps/v1", vec![deployment("web"), deployment("worker")]),
    )
    .await;
    let _pods = mock_json(
        &mut server,
        "/api/v1/namespaces/shop/pods",
        list("PodList", "v1", vec![pod("web-1", "web")]),
    )
    .await;
    let _services = mock_json(
        &mut server,
        "/api/v1/namespaces/shop/services",
        list("ServiceList", "v1", vec![]),
    )
    .await;
    let _configmaps = mock_json(
        &mut server,
        "/api/v1/namespaces/shop/configmaps",
        list("ConfigMapList", "v1", vec![]),
    )
    .await;
    let _ingresses = mock_json(
        &mut server,
        "/apis/networking.k8s.io/v1/namespaces/shop/ingresses",
        list("IngressList", "networking.k8s.io/v1", vec![]),
    )
    .await;
    let _hpas = mock_json(
        &mut server,
        "/apis/autoscaling/v2/namespaces/shop/horizontalpodautoscalers",
        list("HorizontalPodAutoscalerList", "autoscaling/v2", vec![]),
    )
    .await;
    let _events = mock_json(
        &mut server,
        "/api/v1/namespaces/shop/events",
        list("EventList", "v1", vec![event("web-1.abc", "BackOff")]),
    )
    .await;

    let client = client_for(&server);
    let index = DiscoveryIndex::new(KubeDiscovery::new(client.clone()));
    let gathered = ResourceGatherer::new(client, &index)
        .gather("shop", &[], true)
        .await;

    let keys: Vec<&str> = gathered.resources.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["deployments", "events", "pods"]);
    assert!(gathered.warnings.is_empty(), "{:?}", gathered.warnings);
}

/// Serve `found` as `(namespace, name, port)` Services and answer every other
/// well-known lookup in `namespaces` with 404. Mocks are keyed by `namespace/name`.
async fn mock_services(
    server: &mut ServerGuard,
    namespaces: &[&str],
    found: &[(&str, &str, i32)],
) -> Vec<(String, Mock)> {
    let mut mocks = Vec::new();
    for namespace in namespaces {
        for name in SERVICE_NAMES {
            let path = format!("/api/v1/namespaces/{}/services/{}", namespace, name);
            let served = found.iter().find(|(ns, n, _)| ns == namespace && n == name);
            let mock = match served {
                Some((_, _, port)) => {
                    mock_json(
                        server,
                        &path,
                        json!({
                            "apiVersion": "v1",
                            "kind": "Service",
                            "metadata": {"name": name, "namespace": namespace},
                            "spec": {"ports": [{"name": "http", "port": port}]}
                        }),
                    )
                    .await
                }
                None => {
                    let message = format!("services \"{}\" not found", name);
                    mock_not_found(server, &path, &message).await
                }
            };
            mocks.push((format!("{}/{}", namespace, name), mock));
        }
    }
    mocks
}

#[tokio::test]
async fn test_detect_service_searches_well_known_namespaces() {
    let mut server = Server::new_async().await;
    let mocks = mock_services(
        &mut server,
        NAMESPACES,
        &[
            ("monitoring", "prometheus-server", 80),
            ("observability", "prometheus", 9090),
        ],
    )
    .await;

    let client = client_for(&server);
    let location = detect_service(&client, None).await.unwrap();

    assert_eq!(
        location,
        ServiceLocation {
            name: "prometheus-server".to_string(),
            namespace: "monitoring".to_string(),
            port: 80,
        }
    );
    assert_eq!(
        location.cluster_url(),
        "http://prometheus-server.monitoring.svc.cluster.local:80/"
    );

    // Earlier namespaces were tried with every name before `monitoring`.
    for (key, mock) in &mocks {
        if key.starts_with("prometheus-system/") || key.starts_with("prometheus/") {
            mock.assert_async().await;
        }
    }
}

#[tokio::test]
async fn test_detect_service_tries_names_in_order() {
    let mut server = Server::new_async().await;
    let _mocks = mock_services(
        &mut server,
        &["observability"],
        &[
            ("observability", "prometheus", 9090),
            ("observability", "kube-prometheus-stack-prometheus", 9090),
        ],
    )
    .await;

    let client = client_for(&server);
    let location = detect_service(&client, Some("observability")).await.unwrap();

    assert_eq!(location.name, "prometheus");
    assert_eq!(
        location.cluster_url(),
        "http://prometheus.observability.svc.cluster.local:9090/"
    );
}

#[tokio::test]
async fn test_detect_service_only_searches_the_given_namespace() {
    let mut server = Server::new_async().await;
    let mocks = mock_services(
        &mut server,
        &["monitoring", "kube-system"],
        &[("monitoring", "prometheus-server", 80)],
    )
    .await;

    let client = client_for(&server);
    let location = detect_service(&client, Some("monitoring")).await.unwrap();
    assert_eq!(location.namespace, "monitoring");

    match detect_service(&client, Some("kube-system")).await {
        Err(PrometheusError::Unavailable(message)) => {
            assert!(message.contains("kube-system"), "{}", message);
            assert!(!message.contains("monitoring"), "{}", message);
        }
        other => panic!("expected Unavailable, got {:?}", other),
    }

    for (key, mock) in &mocks {
        if key.starts_with("kube-system/") {
            mock.assert_async().await;
        }
    }
}
