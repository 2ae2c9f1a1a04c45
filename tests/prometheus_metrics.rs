use chrono::{TimeZone, Utc};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{Value, json};
use std::time::Duration;

use kubectl_ai::metrics::queries;
use kubectl_ai::metrics::{
    MetricsCollector, MetricsError, PrometheusError, PrometheusSource, ResourceMetrics, Trend,
};

/// Integration tests for Prometheus access and metric collection

const TIMEOUT: Duration = Duration::from_secs(5);

fn matrix(values: &[f64]) -> Value {
    let start = 1_700_000_000.0;
    let values: Vec<Value> = values
        .iter()
        .enumerate()
        .map(|(i, v)| json!([start + 300.0 * i as f64, v.to_string()]))
        .collect();
    json!({
        "status": "success",
        "data": {
            "resultType": "matrix",
            "result": [{"metric": {"pod": "web-1"}, "values": values}]
        }
    })
}

async fn mock_up_query(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::UrlEncoded("query".into(), "up".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "status": "success",
                "data": {"resultType": "vector", "result": []}
            })
            .to_string(),
        )
        .create_async()
        .await
}

/// Evaluation time used by the collection test: 2023-11-15T00:00:00Z.
const NOW: i64 = 1_700_006_400;

/// Range query window as `(start, end, step)`.
type Window = (i64, i64, u64);

const PRIMARY_1H: Window = (NOW - 3_600, NOW, 300);
const FALLBACK_24H: Window = (NOW - 86_400, NOW, 900);

async fn mock_range(server: &mut ServerGuard, query: String, window: Window, values: &[f64]) -> Mock {
    let (start, end, step) = window;
    server
        .mock("GET", "/api/v1/query_range")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), query),
            Matcher::UrlEncoded("start".into(), start.to_string()),
            Matcher::UrlEncoded("end".into(), end.to_string()),
            Matcher::UrlEncoded("step".into(), step.to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(matrix(values).to_string())
        .create_async()
        .await
}

fn primary(name: &str) -> String {
    queries::find(name).unwrap().render("web", "shop")
}

fn fallback(name: &str) -> String {
    queries::find(name).unwrap().render_fallback("web", "shop").unwrap()
}

#[tokio::test]
async fn test_explicit_url_is_checked() {
    let mut server = Server::new_async().await;
    let up = mock_up_query(&mut server).await;

    let source = PrometheusSource::from_url(&server.url(), TIMEOUT).await.unwrap();

    up.assert_async().await;
    assert!(source.base_url().ends_with('/'));
    assert!(!source.is_tunneled());
    source.close().await;
}

#[tokio::test]
async fn test_unhealthy_endpoint_is_unavailable() {
    let mut server = Server::new_async().await;
    let _up = server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("service unavailable")
        .create_async()
        .await;

    let result = PrometheusSource::from_url(&server.url(), TIMEOUT).await;

    assert!(matches!(result, Err(PrometheusError::Unavailable(_))));
}

#[tokio::test]
async fn test_error_status_is_unavailable() {
    let mut server = Server::new_async().await;
    let _up = server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"status": "error", "error": "bad_data"}).to_string())
        .create_async()
        .await;

    let result = PrometheusSource::from_url(&server.url(), TIMEOUT).await;

    match result {
        Err(PrometheusError::Unavailable(message)) => assert!(message.contains("bad_data")),
        other => panic!("expected Unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_collect_with_sparse_fallback() {
    let mut server = Server::new_async().await;
    let _up = mock_up_query(&mut server).await;

    // cpu: sparse primary, denser fallback wins
    let _cpu = mock_range(&mut server, primary("cpu_utilization"), PRIMARY_1H, &[40.0, 50.0, 60.0]).await;
    let _cpu_fallback = mock_range(
        &mut server,
        fallback("cpu_utilization"),
        FALLBACK_24H,
        &[30.0, 32.0, 34.0, 36.0, 38.0, 40.0, 50.0, 55.0, 60.0, 65.0, 70.0, 75.0],
    )
    .await;

    // memory: sparse primary, sparser fallback is ignored
    let _memory = mock_range(&mut server, primary("memory_utilization"), PRIMARY_1H, &[256.0, 260.0, 258.0, 262.0]).await;
    let _memory_fallback = mock_range(&mut server, fallback("memory_utilization"), FALLBACK_24H, &[100.0, 120.0]).await;

    let _replicas = mock_range(
        &mut server,
        primary("pod_replicas"),
        PRIMARY_1H,
        &[2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 2.0, 2.0],
    )
    .await;

    let source = PrometheusSource::from_url(&server.url(), TIMEOUT).await.unwrap();
    let now = Utc.timestamp_opt(NOW, 0).unwrap();
    assert_eq!(now, Utc.with_ymd_and_hms(2023, 11, 15, 0, 0, 0).unwrap());
    let series = MetricsCollector::new(&source)
        .collect_at("web", "shop", "1h", now)
        .await
        .unwrap();
    source.close().await;

    let names: Vec<&str> = series.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["cpu_utilization", "memory_utilization", "pod_replicas"]);
    assert_eq!(series["cpu_utilization"].len(), 12);
    assert_eq!(series["memory_utilization"].len(), 4);

    let metrics = ResourceMetrics::new("web", "shop", "1h", series);
    let cpu = &metrics.summaries["cpu_utilization"];
    assert_eq!(cpu.stats.peak, 75.0);
    assert_eq!(cpu.stats.current, 75.0);
    assert_eq!(cpu.trend, Trend::Increasing);
    assert_eq!(metrics.scaling_events.len(), 2);
    assert_eq!(metrics.scaling_events[0].from_replicas, 2);
    assert_eq!(metrics.scaling_events[0].to_replicas, 3);
}

#[tokio::test]
async fn test_invalid_duration_is_rejected_before_querying() {
    let mut server = Server::new_async().await;
    let _up = mock_up_query(&mut server).await;
    let range = server
        .mock("GET", "/api/v1/query_range")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let source = PrometheusSource::from_url(&server.url(), TIMEOUT).await.unwrap();
    let result = MetricsCollector::new(&source).collect("web", "shop", "5x").await;

    assert!(matches!(result, Err(MetricsError::InvalidDuration(_))));
    range.assert_async().await;
}
