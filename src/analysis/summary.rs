//! Run-level summary of a walk-forward report.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::walkforward::WalkForwardReport;

use super::stats;

/// Descriptive statistics over the defined values of one score column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ScoreStats {
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            count: values.len(),
            mean: stats::mean(values),
            std_dev: stats::std_dev(values),
            min: stats::min(values),
            max: stats::max(values),
        }
    }

    fn from_column(column: Vec<Option<f64>>) -> Self {
        let values: Vec<f64> = column.into_iter().flatten().collect();
        Self::from_values(&values)
    }
}

/// How much one parameter's choice moved across windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterStability {
    pub name: String,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub most_common: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_windows: usize,
    pub valid_windows: usize,
    pub degenerate_windows: usize,
    pub in_sample: ScoreStats,
    pub out_sample: ScoreStats,
    pub mean_degradation: Option<f64>,
    /// Share of scored windows with a positive out-of-sample score.
    pub positive_out_sample_fraction: Option<f64>,
    pub parameter_stability: Vec<ParameterStability>,
}

impl ReportSummary {
    pub fn from_report(report: &WalkForwardReport) -> Self {
        let out_scores: Vec<f64> = report.out_sample_scores().into_iter().flatten().collect();
        let positive_out_sample_fraction = if out_scores.is_empty() {
            None
        } else {
            let positive = out_scores.iter().filter(|s| **s > 0.0).count();
            Some(positive as f64 / out_scores.len() as f64)
        };

        let degradations: Vec<f64> = report
            .windows()
            .iter()
            .filter_map(|w| w.degradation)
            .collect();

        let parameter_stability = report
            .parameter_names
            .iter()
            .map(|name| {
                let values: Vec<f64> = report.parameter_values(name).into_iter().flatten().collect();
                ParameterStability {
                    name: name.clone(),
                    mean: stats::mean(&values),
                    std_dev: stats::std_dev(&values),
                    most_common: stats::mode(&values),
                }
            })
            .collect();

        let degenerate_windows = report.degenerate_count();

        Self {
            total_windows: report.len(),
            valid_windows: report.len() - degenerate_windows,
            degenerate_windows,
            in_sample: ScoreStats::from_column(report.in_sample_scores()),
            out_sample: ScoreStats::from_values(&out_scores),
            mean_degradation: stats::mean(&degradations),
            positive_out_sample_fraction,
            parameter_stability,
        }
    }

    /// Multi-line text for terminal output.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "=== Walk-Forward Summary ===");
        let _ = writeln!(
            out,
            "Windows: {} total, {} valid, {} degenerate",
            self.total_windows, self.valid_windows, self.degenerate_windows
        );
        let _ = writeln!(out, "In-sample:      {}", render_stats(&self.in_sample));
        let _ = writeln!(out, "Out-of-sample:  {}", render_stats(&self.out_sample));
        let _ = writeln!(out, "Mean degradation: {}", fmt_opt(self.mean_degradation));
        let _ = writeln!(
            out,
            "Positive OOS windows: {}",
            self.positive_out_sample_fraction
                .map(|f| format!("{:.1}%", f * 100.0))
                .unwrap_or_else(|| "n/a".into())
        );

        if !self.parameter_stability.is_empty() {
            let _ = writeln!(out, "Parameter stability:");
            for p in &self.parameter_stability {
                let _ = writeln!(
                    out,
                    "  {}: mean {}, std {}, most common {}",
                    p.name,
                    fmt_opt(p.mean),
                    fmt_opt(p.std_dev),
                    fmt_opt(p.most_common)
                );
            }
        }

        out
    }
}

impl WalkForwardReport {
    pub fn summary(&self) -> ReportSummary {
        ReportSummary::from_report(self)
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "n/a".into())
}

fn render_stats(stats: &ScoreStats) -> String {
    format!(
        "n={} mean {} std {} min {} max {}",
        stats.count,
        fmt_opt(stats.mean),
        fmt_opt(stats.std_dev),
        fmt_opt(stats.min),
        fmt_opt(stats.max)
    )
}
