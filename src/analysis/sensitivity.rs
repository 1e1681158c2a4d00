//! Parameter sensitivity across windows.
//!
//! Relates each parameter's chosen value to the out-of-sample score of the
//! window it was chosen in. High dispersion or a strong correlation suggests
//! the selection is fitting noise.
//!
//! Dispersion covers every window with a chosen value; correlation needs an
//! out-of-sample score as well.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::walkforward::{ExportError, WalkForwardReport};

use super::stats;

/// Sensitivity statistics for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRecord {
    pub parameter: String,
    /// Windows with a chosen value.
    pub observations: usize,
    /// Windows with both a chosen value and an out-of-sample score.
    pub scored_observations: usize,
    /// Pearson correlation between value and out-of-sample score.
    pub correlation: Option<f64>,
    /// Sample standard deviation over mean; 0 when the mean is 0.
    pub coefficient_of_variation: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    /// Max minus min of the chosen values.
    pub range: Option<f64>,
}

impl SensitivityRecord {
    fn new(parameter: &str, values: &[f64], paired: &[(f64, f64)]) -> Self {
        let (paired_values, scores): (Vec<f64>, Vec<f64>) = paired.iter().copied().unzip();
        let mean = stats::mean(values);
        let std_dev = stats::std_dev(values);
        let coefficient_of_variation = match mean {
            Some(m) if m == 0.0 => Some(0.0),
            Some(m) => std_dev.map(|s| s / m),
            None => None,
        };

        Self {
            parameter: parameter.to_string(),
            observations: values.len(),
            scored_observations: paired.len(),
            correlation: stats::correlation(&paired_values, &scores),
            coefficient_of_variation,
            mean,
            std_dev,
            range: stats::range(values),
        }
    }
}

/// One record per declared parameter, in declaration order.
pub fn sensitivity(report: &WalkForwardReport) -> Vec<SensitivityRecord> {
    report
        .parameter_names
        .iter()
        .map(|name| {
            let values: Vec<f64> = report.parameter_values(name).into_iter().flatten().collect();
            let paired: Vec<(f64, f64)> = report
                .windows()
                .iter()
                .filter_map(|w| Some((w.param_value(name)?, w.out_sample_score?)))
                .collect();
            SensitivityRecord::new(name, &values, &paired)
        })
        .collect()
}

pub fn write_sensitivity_csv<W: Write>(
    records: &[SensitivityRecord],
    writer: W,
) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in records {
        csv.serialize(record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Fixed-width table for terminal output.
pub fn render_sensitivity(records: &[SensitivityRecord]) -> String {
    let cell = |v: Option<f64>| v.map(|x| format!("{:.4}", x)).unwrap_or_else(|| "n/a".into());

    let mut out = format!(
        "{:<16} {:>5} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
        "parameter", "n", "scored", "corr", "cv", "mean", "std", "range"
    );
    for r in records {
        out.push_str(&format!(
            "{:<16} {:>5} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
            r.parameter,
            r.observations,
            r.scored_observations,
            cell(r.correlation),
            cell(r.coefficient_of_variation),
            cell(r.mean),
            cell(r.std_dev),
            cell(r.range)
        ));
    }
    out
}
