//! Walk-forward run configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::OptimizationMetric;

/// Problems that stop a run before any window is processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("Invalid configuration: no parameter ranges declared")]
    NoParameters,

    #[error("Invalid configuration: parameter '{0}' declared more than once")]
    DuplicateParameter(String),

    #[error("Invalid configuration: strategy requires parameter '{0}' but no range was given")]
    MissingParameter(String),

    #[error("Invalid configuration: strategy does not accept parameter '{0}'")]
    UnknownParameter(String),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// Window sizing, ranking metric and execution policy.
///
/// Sizes are observation counts, not calendar time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Observations used for parameter search.
    pub in_sample_size: usize,
    /// Observations used for validation, immediately after the in-sample slice.
    pub out_sample_size: usize,
    /// Roll forward by this many observations.
    pub step_size: usize,
    /// Metric maximized by the grid search.
    pub optimization_metric: OptimizationMetric,
    /// Dispatch windows to a worker pool.
    pub parallel: bool,
    /// Worker threads used when `parallel` is set.
    pub worker_count: usize,
    /// Also evaluate grid entries concurrently within a window.
    pub parallel_grid: bool,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            in_sample_size: 252,
            out_sample_size: 63,
            step_size: 21,
            optimization_metric: OptimizationMetric::RiskAdjustedReturn,
            parallel: false,
            worker_count: 4,
            parallel_grid: false,
        }
    }
}

impl WalkForwardConfig {
    /// Creates a config with custom window sizes.
    #[must_use]
    pub fn new(in_sample_size: usize, out_sample_size: usize, step_size: usize) -> Self {
        Self {
            in_sample_size,
            out_sample_size,
            step_size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_metric(mut self, metric: impl Into<OptimizationMetric>) -> Self {
        self.optimization_metric = metric.into();
        self
    }

    /// Enables window-level parallelism on `worker_count` threads.
    #[must_use]
    pub fn with_parallel(mut self, worker_count: usize) -> Self {
        self.parallel = true;
        self.worker_count = worker_count;
        self
    }

    #[must_use]
    pub fn with_parallel_grid(mut self, parallel_grid: bool) -> Self {
        self.parallel_grid = parallel_grid;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("in_sample_size", self.in_sample_size),
            ("out_sample_size", self.out_sample_size),
            ("step_size", self.step_size),
            ("worker_count", self.worker_count),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }
        Ok(())
    }
}
