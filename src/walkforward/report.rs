//! Walk-forward results.
//!
//! One `WindowResult` per scheduled window, in chronological order. Windows
//! that could not be optimized stay in the report with an explicit status so
//! a bad window never hides the rest.

use std::collections::BTreeSet;
use std::io::Write;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{Evaluation, OptimizationMetric};

use super::grid::ParameterSet;
use super::windows::WalkForwardWindow;

/// Prefix for parameter columns in the flat table.
pub const PARAM_PREFIX: &str = "param_";
/// Prefix for out-of-sample metric columns in the flat table.
pub const OUT_PREFIX: &str = "out_";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a window's optimization ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    /// Parameters were selected and validated out of sample.
    Optimized,
    /// No grid entry produced a measurable score.
    NoValidParameters,
    /// The evaluator failed for this window.
    EvaluationFailed { reason: String },
}

impl WindowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimized => "optimized",
            Self::NoValidParameters => "no_valid_parameters",
            Self::EvaluationFailed { .. } => "evaluation_failed",
        }
    }
}

/// Outcome of one walk-forward window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    /// Window number (1-indexed).
    pub window: usize,
    /// First in-sample date.
    pub start_date: NaiveDate,
    /// Last out-of-sample date.
    pub end_date: NaiveDate,
    pub status: WindowStatus,
    /// Parameters selected on the in-sample slice.
    pub params: Option<ParameterSet>,
    pub in_sample_score: Option<f64>,
    /// Score of the same parameters on the out-of-sample slice.
    pub out_sample_score: Option<f64>,
    /// In-sample score minus out-of-sample score.
    pub degradation: Option<f64>,
    /// Every metric from the out-of-sample evaluation.
    pub out_sample_metrics: Evaluation,
    /// Grid entries evaluated in sample.
    pub combinations_evaluated: usize,
}

impl WindowResult {
    /// Row for a window whose best parameters were validated out of sample.
    pub fn optimized(
        window: &WalkForwardWindow<'_>,
        params: ParameterSet,
        in_sample_score: Option<f64>,
        out_sample_score: Option<f64>,
        out_sample_metrics: Evaluation,
        combinations_evaluated: usize,
    ) -> Self {
        let degradation = match (in_sample_score, out_sample_score) {
            (Some(is), Some(oos)) => Some(is - oos),
            _ => None,
        };

        Self {
            window: window.index,
            start_date: window.start_date(),
            end_date: window.end_date(),
            status: WindowStatus::Optimized,
            params: Some(params),
            in_sample_score,
            out_sample_score,
            degradation,
            out_sample_metrics,
            combinations_evaluated,
        }
    }

    /// Degenerate row: no grid entry scored.
    pub fn no_valid_parameters(window: &WalkForwardWindow<'_>, combinations_evaluated: usize) -> Self {
        Self::degenerate(window, WindowStatus::NoValidParameters, None, None, combinations_evaluated)
    }

    /// Degenerate row: the evaluator failed. Keeps any in-sample selection.
    pub fn evaluation_failed(
        window: &WalkForwardWindow<'_>,
        reason: String,
        params: Option<ParameterSet>,
        in_sample_score: Option<f64>,
        combinations_evaluated: usize,
    ) -> Self {
        Self::degenerate(
            window,
            WindowStatus::EvaluationFailed { reason },
            params,
            in_sample_score,
            combinations_evaluated,
        )
    }

    fn degenerate(
        window: &WalkForwardWindow<'_>,
        status: WindowStatus,
        params: Option<ParameterSet>,
        in_sample_score: Option<f64>,
        combinations_evaluated: usize,
    ) -> Self {
        Self {
            window: window.index,
            start_date: window.start_date(),
            end_date: window.end_date(),
            status,
            params,
            in_sample_score,
            out_sample_score: None,
            degradation: None,
            out_sample_metrics: Evaluation::new(),
            combinations_evaluated,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.status != WindowStatus::Optimized
    }

    /// Value chosen for `name` in this window, as a number.
    pub fn param_value(&self, name: &str) -> Option<f64> {
        self.params.as_ref().and_then(|p| p.get_f64(name))
    }
}

/// Ordered walk-forward results for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardReport {
    /// Metric used for selection.
    pub metric: OptimizationMetric,
    /// Parameter names in declaration order.
    pub parameter_names: Vec<String>,
    windows: Vec<WindowResult>,
}

impl WalkForwardReport {
    pub fn new(
        metric: OptimizationMetric,
        parameter_names: Vec<String>,
        windows: Vec<WindowResult>,
    ) -> Self {
        Self {
            metric,
            parameter_names,
            windows,
        }
    }

    pub fn windows(&self) -> &[WindowResult] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// No window fit in the series.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn degenerate_count(&self) -> usize {
        self.windows.iter().filter(|w| w.is_degenerate()).count()
    }

    /// At least one window and none of them optimized.
    pub fn all_degenerate(&self) -> bool {
        !self.windows.is_empty() && self.degenerate_count() == self.windows.len()
    }

    pub fn in_sample_scores(&self) -> Vec<Option<f64>> {
        self.windows.iter().map(|w| w.in_sample_score).collect()
    }

    pub fn out_sample_scores(&self) -> Vec<Option<f64>> {
        self.windows.iter().map(|w| w.out_sample_score).collect()
    }

    /// Per-window chosen values for one parameter.
    pub fn parameter_values(&self, name: &str) -> Vec<Option<f64>> {
        self.windows.iter().map(|w| w.param_value(name)).collect()
    }

    /// Sorted union of out-of-sample metric names across windows.
    pub fn out_sample_metric_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .windows
            .iter()
            .flat_map(|w| w.out_sample_metrics.names())
            .collect();
        names.into_iter().map(String::from).collect()
    }

    /// Flat table with one row per window.
    pub fn to_table(&self) -> ReportTable {
        let metric_names = self.out_sample_metric_names();

        let mut headers: Vec<String> = [
            "window",
            "start_date",
            "end_date",
            "status",
            "in_sample_score",
            "out_sample_score",
            "degradation",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect();
        headers.extend(self.parameter_names.iter().map(|n| format!("{}{}", PARAM_PREFIX, n)));
        headers.extend(metric_names.iter().map(|n| format!("{}{}", OUT_PREFIX, n)));

        let rows = self
            .windows
            .iter()
            .map(|w| {
                let mut row = vec![
                    w.window.to_string(),
                    w.start_date.to_string(),
                    w.end_date.to_string(),
                    w.status.as_str().to_string(),
                    fmt_cell(w.in_sample_score),
                    fmt_cell(w.out_sample_score),
                    fmt_cell(w.degradation),
                ];
                row.extend(self.parameter_names.iter().map(|n| {
                    w.params
                        .as_ref()
                        .and_then(|p| p.get(n))
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                }));
                row.extend(
                    metric_names
                        .iter()
                        .map(|n| fmt_cell(w.out_sample_metrics.get(n))),
                );
                row
            })
            .collect();

        ReportTable { headers, rows }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        self.to_table().write_csv(writer)
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn fmt_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Rectangular string table for export.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn column(&self, header: &str) -> Option<Vec<&str>> {
        let idx = self.headers.iter().position(|h| h == header)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(&self.headers)?;
        for row in &self.rows {
            csv.write_record(row)?;
        }
        csv.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Bar;
    use crate::metrics::metric::{SHARPE_RATIO, TOTAL_RETURN};
    use crate::walkforward::windows::WindowScheduler;
    use chrono::Duration;

    fn bars(n: usize) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        (0..n)
            .map(|i| Bar::from_close(start + Duration::days(i as i64), 100.0))
            .collect()
    }

    fn sample_report(data: &[Bar]) -> WalkForwardReport {
        let windows = WindowScheduler::new(4, 2, 2).generate(data);
        let params = ParameterSet::new().with("fast_ma", 5_i64).with("slow_ma", 20_i64);

        let first = WindowResult::optimized(
            &windows[0],
            params,
            Some(1.5),
            Some(0.5),
            Evaluation::new().with(SHARPE_RATIO, 0.5).with(TOTAL_RETURN, 0.02),
            16,
        );
        let second = WindowResult::no_valid_parameters(&windows[1], 16);

        WalkForwardReport::new(
            OptimizationMetric::RiskAdjustedReturn,
            vec!["fast_ma".into(), "slow_ma".into()],
            vec![first, second],
        )
    }

    #[test]
    fn test_optimized_row_degradation() {
        let data = bars(8);
        let report = sample_report(&data);
        let row = &report.windows()[0];

        assert_eq!(row.degradation, Some(1.0));
        assert_eq!(row.start_date, data[0].date);
        assert_eq!(row.end_date, data[5].date);
        assert!(!row.is_degenerate());
    }

    #[test]
    fn test_degenerate_rows_are_kept() {
        let data = bars(8);
        let report = sample_report(&data);

        assert_eq!(report.len(), 2);
        assert_eq!(report.degenerate_count(), 1);
        assert!(!report.all_degenerate());
        assert_eq!(report.parameter_values("fast_ma"), vec![Some(5.0), None]);
        assert_eq!(report.out_sample_scores(), vec![Some(0.5), None]);
    }

    #[test]
    fn test_flat_table_columns() {
        let data = bars(8);
        let table = sample_report(&data).to_table();

        assert_eq!(
            table.headers,
            vec![
                "window",
                "start_date",
                "end_date",
                "status",
                "in_sample_score",
                "out_sample_score",
                "degradation",
                "param_fast_ma",
                "param_slow_ma",
                "out_sharpe_ratio",
                "out_total_return",
            ]
        );
        assert_eq!(table.column("status"), Some(vec!["optimized", "no_valid_parameters"]));
        assert_eq!(table.column("param_fast_ma"), Some(vec!["5", ""]));
        assert_eq!(table.column("degradation"), Some(vec!["1", ""]));
    }

    #[test]
    fn test_write_csv() {
        let data = bars(8);
        let mut out = Vec::new();
        sample_report(&data).write_csv(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("window,start_date,end_date,status"));
        assert!(lines[1].starts_with("1,2023-01-02,2023-01-07,optimized,1.5,0.5,1,5,20"));
    }

    #[test]
    fn test_json_round_trip_preserves_rows() {
        let data = bars(8);
        let report = sample_report(&data);
        let json = report.to_json().unwrap();
        let parsed: WalkForwardReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, report);
    }

    #[test]
    fn test_empty_report() {
        let report = WalkForwardReport::new(OptimizationMetric::TotalReturn, vec![], vec![]);
        assert!(report.is_empty());
        assert!(!report.all_degenerate());
        assert_eq!(report.to_table().rows.len(), 0);
    }
}
