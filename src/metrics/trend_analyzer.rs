//! Statistics and classification over metric series.
//!
//! Everything here is a pure function of the samples.

use serde::Serialize;
use std::fmt;

use super::types::{Sample, ScalingEvent, SeriesStats};

/// Relative first-to-last change needed to call a series a trend.
const TREND_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Utilization {
    Low,
    Medium,
    High,
    Critical,
}

impl Utilization {
    /// >90 critical, >70 high, >30 medium, otherwise low.
    pub fn from_peak(peak: f64) -> Self {
        if peak > 90.0 {
            Self::Critical
        } else if peak > 70.0 {
            Self::High
        } else if peak > 30.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Utilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(label)
    }
}

pub fn statistics(samples: &[Sample]) -> SeriesStats {
    let Some(last) = samples.last() else {
        return SeriesStats::default();
    };

    let sum: f64 = samples.iter().map(|s| s.value).sum();
    let peak = samples.iter().map(|s| s.value).fold(f64::NEG_INFINITY, f64::max);
    let minimum = samples.iter().map(|s| s.value).fold(f64::INFINITY, f64::min);

    SeriesStats {
        average: sum / samples.len() as f64,
        peak,
        minimum,
        current: last.value,
    }
}

/// Compare the first and last sample; a change beyond 10% of the first
/// value is a trend.
pub fn classify_trend(samples: &[Sample]) -> Trend {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return Trend::Stable;
    };
    if samples.len() < 2 {
        return Trend::Stable;
    }

    let diff = last.value - first.value;
    let threshold = first.value * TREND_THRESHOLD;
    if diff > threshold {
        Trend::Increasing
    } else if diff < -threshold {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Replica count changes between consecutive samples.
pub fn scaling_events(samples: &[Sample]) -> Vec<ScalingEvent> {
    samples
        .windows(2)
        .filter_map(|pair| {
            let from = pair[0].value.round() as i64;
            let to = pair[1].value.round() as i64;
            (from != to).then(|| ScalingEvent {
                timestamp: pair[1].timestamp,
                from_replicas: from,
                to_replicas: to,
            })
        })
        .collect()
}
