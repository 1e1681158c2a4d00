//! Robust parameter extraction.
//!
//! Collapses the per-window parameter choices into one recommended assignment.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::walkforward::{ParamValue, ParameterSet, WalkForwardReport};

use super::stats;

/// How per-window values are reduced to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AggregationMethod {
    #[default]
    Median,
    Mean,
    /// Most frequent value, smallest on ties.
    Mode,
}

impl AggregationMethod {
    /// Parse a method name, falling back to median for unknown names.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "median" => Self::Median,
            "mean" | "average" => Self::Mean,
            "mode" | "most-common" | "most_common" => Self::Mode,
            other => {
                warn!("Unknown aggregation method '{}', using median", other);
                Self::Median
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::Mean => "mean",
            Self::Mode => "mode",
        }
    }

    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        match self {
            Self::Median => stats::median(values),
            Self::Mean => stats::mean(values),
            Self::Mode => stats::mode(values),
        }
    }
}

impl From<String> for AggregationMethod {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One aggregated value per declared parameter, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustParameters {
    pub method: AggregationMethod,
    pub values: Vec<(String, Option<f64>)>,
}

impl RobustParameters {
    /// Aggregate the chosen values of every parameter in `report`.
    ///
    /// Windows without a parameter choice are skipped.
    pub fn from_report(report: &WalkForwardReport, method: AggregationMethod) -> Self {
        let values = report
            .parameter_names
            .iter()
            .map(|name| {
                let chosen: Vec<f64> = report
                    .parameter_values(name)
                    .into_iter()
                    .flatten()
                    .collect();
                (name.clone(), method.reduce(&chosen))
            })
            .collect();

        Self { method, values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }

    /// Every parameter has an aggregated value.
    pub fn is_complete(&self) -> bool {
        !self.values.is_empty() && self.values.iter().all(|(_, v)| v.is_some())
    }

    /// Convert to an assignment; integral values become integers.
    pub fn to_parameter_set(&self) -> Option<ParameterSet> {
        let mut set = ParameterSet::new();
        for (name, value) in &self.values {
            let value = (*value)?;
            let param = if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                ParamValue::Int(value as i64)
            } else {
                ParamValue::Float(value)
            };
            set.set(name, param);
        }
        Some(set)
    }
}

impl fmt::Display for RobustParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Robust parameters ({}):", self.method)?;
        for (name, value) in &self.values {
            match value {
                Some(v) => writeln!(f, "  {}: {}", name, v)?,
                None => writeln!(f, "  {}: n/a", name)?,
            }
        }
        Ok(())
    }
}
