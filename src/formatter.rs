//! Rendering of analysis results and metric reports.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;

use crate::analysis::Analysis;
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::metrics::{ResourceMetrics, Utilization};

const WRAP_WIDTH: usize = 100;

/// Serialize for machine-readable formats. `Human` falls back to JSON.
pub fn to_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        OutputFormat::Json | OutputFormat::Human => serde_json::to_string_pretty(value)?,
    })
}

pub fn print_analysis(analysis: &Analysis, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => print!("{}", render_analysis(analysis)),
        other => println!("{}", to_structured(analysis, other)?),
    }
    Ok(())
}

pub fn print_metrics(metrics: &[ResourceMetrics], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => print!("{}", render_metrics(metrics)),
        other => println!("{}", to_structured(&metrics, other)?),
    }
    Ok(())
}

fn severity_icon(severity: &str) -> &'static str {
    match severity.to_lowercase().as_str() {
        "critical" => "🔴",
        "high" => "🟠",
        "medium" => "🟡",
        "low" => "🟢",
        _ => "⚪",
    }
}

fn priority_icon(priority: &str) -> &'static str {
    match priority.to_lowercase().as_str() {
        "high" => "⚡",
        "medium" => "📌",
        _ => "💡",
    }
}

fn wrap(text: &str, indent: &str) -> String {
    let options = textwrap::Options::new(WRAP_WIDTH)
        .initial_indent(indent)
        .subsequent_indent(indent);
    textwrap::fill(text.trim(), options)
}

pub fn render_analysis(analysis: &Analysis) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "\n{} {}",
        severity_icon(&analysis.severity),
        analysis.problem.bold()
    );
    if !analysis.severity.is_empty() {
        let _ = writeln!(out, "   Severity: {}", analysis.severity.to_uppercase());
    }

    if !analysis.root_cause.is_empty() {
        let _ = writeln!(out, "\n{}", "Root cause".bold().underline());
        let _ = writeln!(out, "{}", wrap(&analysis.root_cause, "  "));
    }

    if !analysis.issues.is_empty() {
        let _ = writeln!(out, "\n{}", "Issues".bold().underline());
        for issue in &analysis.issues {
            let _ = writeln!(
                out,
                "  {} {} {}",
                severity_icon(&issue.severity),
                issue.component.cyan(),
                issue.description
            );
            if !issue.evidence.is_empty() {
                let _ = writeln!(out, "{}", wrap(&issue.evidence, "      ").dimmed());
            }
        }
    }

    if !analysis.suggestions.is_empty() {
        let _ = writeln!(out, "\n{}", "Suggestions".bold().underline());
        for (i, suggestion) in analysis.suggestions.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {} {}. {}",
                priority_icon(&suggestion.priority),
                i + 1,
                suggestion.action
            );
            if let Some(command) = suggestion.command.as_deref().filter(|c| !c.is_empty()) {
                let _ = writeln!(out, "      $ {}", command.green());
            }
            if !suggestion.explanation.is_empty() {
                let _ = writeln!(out, "{}", wrap(&suggestion.explanation, "      "));
            }
        }
    }

    if let Some(quick_fix) = analysis.quick_fix.as_deref().filter(|q| !q.is_empty()) {
        let _ = writeln!(out, "\n{}", "Quick fix".bold().underline());
        let _ = writeln!(out, "  $ {}", quick_fix.green().bold());
    }

    if !analysis.full_analysis.is_empty() {
        let _ = writeln!(out, "\n{}", "Details".bold().underline());
        let _ = writeln!(out, "{}", wrap(&analysis.full_analysis, "  "));
    }

    out
}

fn utilization_label(utilization: Utilization) -> String {
    let label = utilization.to_string();
    match utilization {
        Utilization::Critical => label.red().bold().to_string(),
        Utilization::High => label.yellow().to_string(),
        Utilization::Medium => label.normal().to_string(),
        Utilization::Low => label.green().to_string(),
    }
}

pub fn render_metrics(metrics: &[ResourceMetrics]) -> String {
    let mut out = String::new();

    if metrics.is_empty() {
        let _ = writeln!(out, "{}", "No metrics collected.".yellow());
        return out;
    }

    for resource in metrics {
        let _ = writeln!(
            out,
            "\n{} {}/{} {}",
            "📊".bold(),
            resource.namespace,
            resource.resource_name.bold(),
            format!("(last {})", resource.duration).dimmed()
        );

        if resource.summaries.is_empty() {
            let _ = writeln!(out, "  {}", "No data returned by Prometheus".yellow());
        } else {
            let _ = writeln!(
                out,
                "  {:<20} {:>10} {:>10} {:>10} {:>10}  {:<8} {:<10} {}",
                "METRIC", "AVG", "PEAK", "MIN", "CURRENT", "UNIT", "TREND", "UTILIZATION"
            );
            for summary in resource.summaries.values() {
                let _ = writeln!(
                    out,
                    "  {:<20} {:>10.2} {:>10.2} {:>10.2} {:>10.2}  {:<8} {:<10} {}",
                    summary.name,
                    summary.stats.average,
                    summary.stats.peak,
                    summary.stats.minimum,
                    summary.stats.current,
                    summary.unit,
                    summary.trend.to_string(),
                    utilization_label(summary.utilization)
                );
            }
        }

        if let Some(config) = &resource.scaling_config {
            let _ = writeln!(
                out,
                "  Scaling: {:?} (min {}, max {}, current {})",
                config.kind, config.min_replicas, config.max_replicas, config.current_replicas
            );
        }

        if !resource.scaling_events.is_empty() {
            let _ = writeln!(out, "  Scaling events:");
            for event in &resource.scaling_events {
                let _ = writeln!(
                    out,
                    "    {} {} -> {}",
                    event.timestamp.format("%Y-%m-%d %H:%M"),
                    event.from_replicas,
                    event.to_replicas
                );
            }
        }

        if let Some(hpa) = &resource.hpa_recommendation {
            let _ = writeln!(out, "\n  {}", "Recommended HPA".bold());
            let _ = writeln!(out, "{}", indent(&hpa.manifest, "    "));
        }
        if let Some(keda) = &resource.keda_recommendation {
            let _ = writeln!(out, "\n  {}", "Recommended KEDA ScaledObject".bold());
            let _ = writeln!(out, "{}", indent(&keda.manifest, "    "));
        }
    }

    out
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}
