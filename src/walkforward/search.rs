//! Exhaustive grid search over one in-sample window.
//!
//! Every assignment is evaluated; there is no pruning because the metric
//! surface is not assumed smooth. The running best is replaced only on a
//! strictly greater score, so the earliest grid entry wins ties.

use rayon::prelude::*;
use tracing::debug;

use crate::data::Bar;
use crate::metrics::OptimizationMetric;
use crate::strategy::{EvaluationError, StrategyEvaluator};

use super::grid::{ParameterGrid, ParameterSet};

/// Score of one grid entry.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateScore {
    /// Metric present and comparable.
    Scored(f64),
    /// Evaluation succeeded but the metric was not measurable.
    Unmeasurable,
    /// The evaluator returned an error.
    Failed(EvaluationError),
}

impl CandidateScore {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Scored(v) => Some(*v),
            _ => None,
        }
    }
}

/// Result of searching one window.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Grid index and assignment of the winner, if any entry scored.
    pub best: Option<(usize, ParameterSet)>,
    pub best_score: Option<f64>,
    /// Number of grid entries evaluated.
    pub evaluated: usize,
    /// Number of entries whose evaluation returned an error.
    pub failed: usize,
    /// First evaluator error in grid order.
    pub first_error: Option<EvaluationError>,
}

impl SearchOutcome {
    pub fn best_params(&self) -> Option<&ParameterSet> {
        self.best.as_ref().map(|(_, p)| p)
    }

    /// Every entry errored (and there was at least one entry).
    pub fn all_failed(&self) -> bool {
        self.evaluated > 0 && self.failed == self.evaluated
    }
}

/// Finds the grid entry maximizing a metric over one data slice.
pub struct WindowOptimizer<'a> {
    evaluator: &'a dyn StrategyEvaluator,
    metric: OptimizationMetric,
    parallel: bool,
}

impl<'a> WindowOptimizer<'a> {
    pub fn new(evaluator: &'a dyn StrategyEvaluator, metric: OptimizationMetric) -> Self {
        Self {
            evaluator,
            metric,
            parallel: false,
        }
    }

    /// Evaluate grid entries concurrently. Selection is unaffected.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Evaluate one assignment and extract its score.
    pub fn score(&self, bars: &[Bar], params: &ParameterSet) -> CandidateScore {
        match self.evaluator.evaluate(bars, params) {
            Ok(eval) => match self.metric.score(&eval) {
                Some(v) => CandidateScore::Scored(v),
                None => CandidateScore::Unmeasurable,
            },
            Err(e) => CandidateScore::Failed(e),
        }
    }

    /// Search the full grid over `bars`.
    pub fn optimize(&self, bars: &[Bar], grid: &ParameterGrid) -> SearchOutcome {
        // Collected in grid order either way.
        let scores: Vec<CandidateScore> = if self.parallel {
            grid.sets()
                .par_iter()
                .map(|params| self.score(bars, params))
                .collect()
        } else {
            grid.iter().map(|params| self.score(bars, params)).collect()
        };

        self.select(grid, scores)
    }

    fn select(&self, grid: &ParameterGrid, scores: Vec<CandidateScore>) -> SearchOutcome {
        let mut best_index: Option<usize> = None;
        let mut best_score: Option<f64> = None;
        let mut failed = 0;
        let mut first_error = None;
        let evaluated = scores.len();

        for (index, score) in scores.into_iter().enumerate() {
            match score {
                CandidateScore::Scored(value) => {
                    let better = match best_score {
                        Some(best) => value > best,
                        None => true,
                    };
                    if better {
                        best_index = Some(index);
                        best_score = Some(value);
                    }
                }
                CandidateScore::Unmeasurable => {}
                CandidateScore::Failed(e) => {
                    failed += 1;
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        let best = best_index.and_then(|i| grid.get(i).map(|p| (i, p.clone())));
        if let Some((index, params)) = &best {
            debug!(
                "Best of {} combinations: #{} {} ({} = {:.4})",
                evaluated,
                index,
                params,
                self.metric,
                best_score.unwrap_or(f64::NAN)
            );
        }

        SearchOutcome {
            best,
            best_score,
            evaluated,
            failed,
            first_error,
        }
    }
}
