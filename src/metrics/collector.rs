//! Metrics Collector: runs the query catalog for one workload.

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use super::prometheus_client::{PrometheusError, PrometheusSource};
use super::queries::{CATALOG, FALLBACK_WINDOW_HOURS, MetricQuery, SPARSE_SAMPLE_THRESHOLD};
use super::types::{MetricSeries, Sample};

static DURATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([hdm])$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Invalid duration '{0}': expected <number><m|h|d>, e.g. 30m, 6h or 7d")]
    InvalidDuration(String),

    #[error(transparent)]
    Prometheus(#[from] PrometheusError),
}

/// Parse `<integer><unit>` with unit `m`, `h` or `d`.
///
/// Spans reaching back past the earliest representable date are rejected.
pub fn parse_duration(spec: &str) -> Result<TimeDelta, MetricsError> {
    let invalid = || MetricsError::InvalidDuration(spec.to_string());

    let captures = DURATION_RE.captures(spec).ok_or_else(invalid)?;
    let amount: i64 = captures[1].parse().map_err(|_| invalid())?;
    let delta = match &captures[2] {
        "m" => TimeDelta::try_minutes(amount),
        "h" => TimeDelta::try_hours(amount),
        _ => TimeDelta::try_days(amount),
    };
    delta
        .filter(|span| Utc::now().checked_sub_signed(*span).is_some())
        .ok_or_else(invalid)
}

/// Range query resolution for a window of the given span, in seconds.
pub fn step_seconds(span: TimeDelta) -> u64 {
    if span <= TimeDelta::hours(6) {
        300
    } else if span <= TimeDelta::hours(24) {
        900
    } else if span <= TimeDelta::days(7) {
        3600
    } else {
        7200
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: u64,
}

impl QueryWindow {
    /// `None` when the start would fall outside the representable range.
    pub fn ending_at(end: DateTime<Utc>, span: TimeDelta) -> Option<Self> {
        Some(Self {
            start: end.checked_sub_signed(span)?,
            end,
            step: step_seconds(span),
        })
    }
}

pub struct MetricsCollector<'a> {
    source: &'a PrometheusSource,
}

impl<'a> MetricsCollector<'a> {
    pub fn new(source: &'a PrometheusSource) -> Self {
        Self { source }
    }

    /// Collect every catalog metric for `resource` over the last `duration`.
    ///
    /// Only a malformed duration is an error. Metrics whose query fails or
    /// returns nothing are left out of the result.
    pub async fn collect(
        &self,
        resource: &str,
        namespace: &str,
        duration: &str,
    ) -> Result<BTreeMap<String, MetricSeries>, MetricsError> {
        self.collect_at(resource, namespace, duration, Utc::now()).await
    }

    pub async fn collect_at(
        &self,
        resource: &str,
        namespace: &str,
        duration: &str,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<String, MetricSeries>, MetricsError> {
        let invalid = || MetricsError::InvalidDuration(duration.to_string());
        let window = QueryWindow::ending_at(now, parse_duration(duration)?).ok_or_else(invalid)?;
        let fallback_window =
            QueryWindow::ending_at(now, TimeDelta::hours(FALLBACK_WINDOW_HOURS)).ok_or_else(invalid)?;

        let mut collected = BTreeMap::new();
        for query in CATALOG {
            let samples = match self.run(&query.render(resource, namespace), &window).await {
                Ok(samples) => samples,
                Err(e) => {
                    warn!("Skipping {} for {}/{}: {}", query.name, namespace, resource, e);
                    continue;
                }
            };

            let samples = if samples.len() < SPARSE_SAMPLE_THRESHOLD {
                self.retry_sparse(query, resource, namespace, &fallback_window, samples)
                    .await
            } else {
                samples
            };

            if samples.is_empty() {
                debug!("No data for {} on {}/{}", query.name, namespace, resource);
                continue;
            }

            collected.insert(
                query.name.to_string(),
                MetricSeries::new(query.name, query.unit, samples),
            );
        }

        Ok(collected)
    }

    async fn run(&self, query: &str, window: &QueryWindow) -> Result<Vec<Sample>, PrometheusError> {
        self.source
            .query_range(query, window.start, window.end, window.step)
            .await
    }

    /// Retry with the query's broader fallback and keep whichever result has
    /// more samples.
    async fn retry_sparse(
        &self,
        query: &MetricQuery,
        resource: &str,
        namespace: &str,
        window: &QueryWindow,
        samples: Vec<Sample>,
    ) -> Vec<Sample> {
        let Some(fallback) = query.render_fallback(resource, namespace) else {
            return samples;
        };

        match self.run(&fallback, window).await {
            Ok(broader) if broader.len() > samples.len() => {
                debug!(
                    "Using fallback query for {} ({} samples instead of {})",
                    query.name,
                    broader.len(),
                    samples.len()
                );
                broader
            }
            Ok(_) => samples,
            Err(e) => {
                debug!("Fallback query for {} failed: {}", query.name, e);
                samples
            }
        }
    }
}
