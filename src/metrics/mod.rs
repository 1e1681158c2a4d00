//! Performance metrics module.
//!
//! Provides:
//! - The closed set of optimization metrics and score extraction
//! - The `Evaluation` metric map returned by strategy evaluators
//! - Return-series statistics (total return, CAGR, Sharpe, Calmar, profit factor)

pub mod calculator;
pub mod metric;

pub use calculator::{MetricsCalculator, PerformanceMetrics, DEFAULT_PERIODS_PER_YEAR};
pub use metric::{Evaluation, OptimizationMetric};
