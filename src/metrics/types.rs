use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::recommender::{HpaRecommendation, KedaRecommendation};
use super::trend_analyzer::{self, Trend, Utilization};
use crate::cluster::ScalingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Summary statistics of a series. All zero for an empty series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SeriesStats {
    pub average: f64,
    pub peak: f64,
    pub minimum: f64,
    /// Value of the chronologically last sample
    pub current: f64,
}

/// One metric for one resource over the query window.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSeries {
    pub name: String,
    pub unit: String,
    pub samples: Vec<Sample>,
    pub stats: SeriesStats,
}

impl MetricSeries {
    pub fn new(name: &str, unit: &str, samples: Vec<Sample>) -> Self {
        let stats = trend_analyzer::statistics(&samples);
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            samples,
            stats,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn summary(&self) -> MetricSummary {
        MetricSummary {
            name: self.name.clone(),
            unit: self.unit.clone(),
            stats: self.stats,
            trend: trend_analyzer::classify_trend(&self.samples),
            utilization: Utilization::from_peak(self.stats.peak),
            sample_count: self.samples.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub unit: String,
    #[serde(flatten)]
    pub stats: SeriesStats,
    pub trend: Trend,
    pub utilization: Utilization,
    pub sample_count: usize,
}

/// A change in replica count between two consecutive samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalingEvent {
    pub timestamp: DateTime<Utc>,
    pub from_replicas: i64,
    pub to_replicas: i64,
}

/// Everything collected for one workload.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceMetrics {
    pub resource_name: String,
    pub resource_type: String,
    pub namespace: String,
    pub duration: String,
    pub timestamp: DateTime<Utc>,
    pub series: BTreeMap<String, MetricSeries>,
    pub summaries: BTreeMap<String, MetricSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scaling_events: Vec<ScalingEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaling_config: Option<ScalingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hpa_recommendation: Option<HpaRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keda_recommendation: Option<KedaRecommendation>,
}

impl ResourceMetrics {
    pub fn new(
        resource_name: &str,
        namespace: &str,
        duration: &str,
        series: BTreeMap<String, MetricSeries>,
    ) -> Self {
        let summaries = series
            .iter()
            .map(|(name, s)| (name.clone(), s.summary()))
            .collect();
        let scaling_events = series
            .get("pod_replicas")
            .map(|s| trend_analyzer::scaling_events(&s.samples))
            .unwrap_or_default();

        Self {
            resource_name: resource_name.to_string(),
            resource_type: "deployment".to_string(),
            namespace: namespace.to_string(),
            duration: duration.to_string(),
            timestamp: Utc::now(),
            series,
            summaries,
            scaling_events,
            scaling_config: None,
            hpa_recommendation: None,
            keda_recommendation: None,
        }
    }
}
