//! Moving-average crossover reference strategy.
//!
//! Long when the fast simple moving average of the close is above the slow
//! one, short otherwise. Short also covers warm-up, before both averages
//! exist. The position taken at
//! the close of session `t - 1` earns the close-to-close return of session `t`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::Bar;
use crate::metrics::{Evaluation, MetricsCalculator, DEFAULT_PERIODS_PER_YEAR};
use crate::walkforward::ParameterSet;

use super::{require_period, EvaluationError, StrategyEvaluator};

pub const FAST_MA: &str = "fast_ma";
pub const SLOW_MA: &str = "slow_ma";

const PARAMETERS: [&str; 2] = [FAST_MA, SLOW_MA];

/// Moving-average crossover evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingAverageCrossover {
    /// Starting capital for the equity curve.
    pub initial_capital: Decimal,
    /// Sessions per year used for annualized metrics.
    pub periods_per_year: f64,
}

impl Default for MovingAverageCrossover {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::from(100_000),
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

impl MovingAverageCrossover {
    pub fn new(initial_capital: Decimal, periods_per_year: f64) -> Self {
        Self {
            initial_capital,
            periods_per_year,
        }
    }

    /// Position held at each bar's close: 1 long, -1 short.
    pub fn signals(closes: &[f64], fast: usize, slow: usize) -> Vec<i8> {
        let fast_ma = simple_moving_average(closes, fast);
        let slow_ma = simple_moving_average(closes, slow);

        fast_ma
            .iter()
            .zip(&slow_ma)
            .map(|(f, s)| match (f, s) {
                (Some(f), Some(s)) if f > s => 1,
                _ => -1,
            })
            .collect()
    }

    /// Per-session strategy returns, one fewer than the number of bars.
    pub fn strategy_returns(bars: &[Bar], fast: usize, slow: usize) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let signals = Self::signals(&closes, fast, slow);

        (1..closes.len())
            .map(|t| {
                let prev = closes[t - 1];
                let market_return = if prev != 0.0 {
                    closes[t] / prev - 1.0
                } else {
                    0.0
                };
                f64::from(signals[t - 1]) * market_return
            })
            .collect()
    }
}

impl StrategyEvaluator for MovingAverageCrossover {
    fn evaluate(&self, bars: &[Bar], params: &ParameterSet) -> Result<Evaluation, EvaluationError> {
        let fast = require_period(params, FAST_MA)?;
        let slow = require_period(params, SLOW_MA)?;

        if bars.len() < 2 {
            return Err(EvaluationError::InsufficientData {
                expected: 2,
                actual: bars.len(),
            });
        }

        let returns = Self::strategy_returns(bars, fast, slow);
        let metrics =
            MetricsCalculator::from_returns(&returns, self.initial_capital, self.periods_per_year);

        Ok(metrics.to_evaluation())
    }

    fn accepted_parameters(&self) -> Option<&[&'static str]> {
        Some(&PARAMETERS)
    }

    fn name(&self) -> &str {
        "ma-crossover"
    }
}

/// Trailing simple moving average; `None` until `period` values are available.
fn simple_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;

    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        if period > 0 && i + 1 >= period {
            out.push(Some(sum / period as f64));
        } else {
            out.push(None);
        }
    }

    out
}
