//! Strategy evaluation contract.
//!
//! The optimizer treats a strategy as a pure function from a data slice and a
//! parameter assignment to a set of metrics. Slices are shared borrows, so an
//! evaluation cannot change what the next evaluation sees.

pub mod moving_average;

use thiserror::Error;

use crate::data::Bar;
use crate::metrics::Evaluation;
use crate::walkforward::ParameterSet;

pub use moving_average::MovingAverageCrossover;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Insufficient data: expected at least {expected} observations, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Evaluation failed: {0}")]
    Failed(String),
}

/// Evaluates one parameter assignment over one data slice.
///
/// Implementations must be deterministic for the optimizer's output to be
/// reproducible. They are shared across worker threads in parallel runs.
pub trait StrategyEvaluator: Send + Sync {
    fn evaluate(&self, bars: &[Bar], params: &ParameterSet) -> Result<Evaluation, EvaluationError>;

    /// Parameter names this strategy reads, if it declares them.
    ///
    /// When declared, the parameter ranges of a run must match this set exactly.
    fn accepted_parameters(&self) -> Option<&[&'static str]> {
        None
    }

    fn name(&self) -> &str {
        "strategy"
    }
}

impl<F> StrategyEvaluator for F
where
    F: Fn(&[Bar], &ParameterSet) -> Result<Evaluation, EvaluationError> + Send + Sync,
{
    fn evaluate(&self, bars: &[Bar], params: &ParameterSet) -> Result<Evaluation, EvaluationError> {
        self(bars, params)
    }
}

/// Read a required positive integer parameter.
pub fn require_period(params: &ParameterSet, name: &str) -> Result<usize, EvaluationError> {
    let value = params
        .get(name)
        .ok_or_else(|| EvaluationError::MissingParameter(name.to_string()))?;

    match value.as_i64() {
        Some(v) if v > 0 => Ok(v as usize),
        _ => Err(EvaluationError::InvalidParameter {
            name: name.to_string(),
            reason: format!("expected a positive integer, got {}", value),
        }),
    }
}
