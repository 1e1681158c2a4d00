//! Optimization metrics and evaluation results.
//!
//! A strategy evaluation produces a named set of numeric metrics. The
//! optimizer ranks parameter sets by one of them, chosen from a closed set.
//! Scores are `Option<f64>`: `None` marks an assignment whose metric could
//! not be measured, and such an assignment can never be selected.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Metric key for total return.
pub const TOTAL_RETURN: &str = "total_return";
/// Metric key for compound annual growth rate.
pub const CAGR: &str = "cagr";
/// Metric key for annualized Sharpe ratio.
pub const SHARPE_RATIO: &str = "sharpe_ratio";
/// Metric key for Calmar ratio (CAGR over max drawdown).
pub const CALMAR_RATIO: &str = "calmar_ratio";
/// Metric key for profit factor.
pub const PROFIT_FACTOR: &str = "profit_factor";

/// Metric the grid search maximizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum OptimizationMetric {
    TotalReturn,
    CompoundGrowthRate,
    #[default]
    RiskAdjustedReturn,
    DrawdownAdjustedReturn,
    ProfitFactor,
}

impl OptimizationMetric {
    pub const ALL: [OptimizationMetric; 5] = [
        Self::TotalReturn,
        Self::CompoundGrowthRate,
        Self::RiskAdjustedReturn,
        Self::DrawdownAdjustedReturn,
        Self::ProfitFactor,
    ];

    /// Parse a metric name, falling back to total return for unknown names.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().replace('_', "-").as_str() {
            "total-return" => Self::TotalReturn,
            "compound-growth-rate" | "cagr" => Self::CompoundGrowthRate,
            "risk-adjusted-return" | "sharpe" | "sharpe-ratio" => Self::RiskAdjustedReturn,
            "drawdown-adjusted-return" | "calmar" | "calmar-ratio" => Self::DrawdownAdjustedReturn,
            "profit-factor" => Self::ProfitFactor,
            other => {
                warn!("Unknown optimization metric '{}', using total return", other);
                Self::TotalReturn
            }
        }
    }

    /// Key looked up in an [`Evaluation`].
    pub fn key(&self) -> &'static str {
        match self {
            Self::TotalReturn => TOTAL_RETURN,
            Self::CompoundGrowthRate => CAGR,
            Self::RiskAdjustedReturn => SHARPE_RATIO,
            Self::DrawdownAdjustedReturn => CALMAR_RATIO,
            Self::ProfitFactor => PROFIT_FACTOR,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TotalReturn => "total-return",
            Self::CompoundGrowthRate => "compound-growth-rate",
            Self::RiskAdjustedReturn => "risk-adjusted-return",
            Self::DrawdownAdjustedReturn => "drawdown-adjusted-return",
            Self::ProfitFactor => "profit-factor",
        }
    }

    /// Extract the score for this metric.
    ///
    /// Missing keys, NaN and negative infinity all yield `None`.
    pub fn score(&self, evaluation: &Evaluation) -> Option<f64> {
        evaluation
            .get(self.key())
            .filter(|v| !v.is_nan() && *v != f64::NEG_INFINITY)
    }
}

impl From<&str> for OptimizationMetric {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<String> for OptimizationMetric {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl fmt::Display for OptimizationMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named metrics produced by one strategy evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Evaluation {
    metrics: BTreeMap<String, f64>,
}

impl Evaluation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// Metrics in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl FromIterator<(String, f64)> for Evaluation {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            metrics: iter.into_iter().collect(),
        }
    }
}
