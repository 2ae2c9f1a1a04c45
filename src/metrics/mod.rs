//! Prometheus side of the pipeline: locating the metrics backend, running the
//! query catalog for a workload and reducing series to statistics.

pub mod collector;
pub mod port_forward;
pub mod prometheus_client;
pub mod queries;
pub mod recommender;
pub mod trend_analyzer;
pub mod types;

pub use collector::{MetricsCollector, MetricsError, parse_duration, step_seconds};
pub use prometheus_client::{PrometheusError, PrometheusOptions, PrometheusSource};
pub use trend_analyzer::{Trend, Utilization};
pub use types::{MetricSeries, MetricSummary, ResourceMetrics, Sample, SeriesStats};
