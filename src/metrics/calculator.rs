//! Performance metrics calculator.
//!
//! Turns a series of per-period strategy returns into the metric set the
//! walk-forward optimizer ranks on. Metrics that cannot be measured for a
//! path (zero variance, no losing periods, capital wiped out, equity outside
//! the `Decimal` range) are left undefined instead of being replaced by a
//! placeholder number.
//!
//! A path of `n` returns has `n + 1` equity observations; CAGR annualizes
//! over the observation count, so 252 daily closes make one year.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

use super::metric::{Evaluation, CAGR, CALMAR_RATIO, PROFIT_FACTOR, SHARPE_RATIO, TOTAL_RETURN};

/// Metric key for maximum drawdown (fraction of peak equity).
pub const MAX_DRAWDOWN: &str = "max_drawdown";
/// Metric key for the share of winning periods.
pub const WIN_RATE: &str = "win_rate";
/// Metric key for final equity.
pub const FINAL_EQUITY: &str = "final_equity";
/// Metric key for the number of return periods.
pub const PERIODS: &str = "periods";

/// Trading sessions per year used for annualization.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// Performance of one strategy path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Number of return periods.
    pub periods: usize,
    /// Final equity over initial equity, minus one.
    pub total_return: f64,
    /// Compound annual growth rate.
    pub cagr: Option<f64>,
    /// Annualized mean over sample standard deviation of returns.
    pub sharpe_ratio: Option<f64>,
    /// Largest peak-to-trough decline as a fraction of the peak.
    pub max_drawdown: f64,
    /// CAGR divided by max drawdown.
    pub calmar_ratio: Option<f64>,
    /// Sum of winning returns over the absolute sum of losing returns.
    pub profit_factor: Option<f64>,
    /// Winning periods over periods with a non-zero return.
    pub win_rate: Option<f64>,
    /// `None` when compounding left the representable `Decimal` range.
    pub final_equity: Option<Decimal>,
    /// Equity reached zero or below at some point.
    pub ruined: bool,
}

impl PerformanceMetrics {
    /// Metric set in the shape the optimizer consumes.
    pub fn to_evaluation(&self) -> Evaluation {
        let mut eval = Evaluation::new()
            .with(TOTAL_RETURN, self.total_return)
            .with(MAX_DRAWDOWN, self.max_drawdown)
            .with(PERIODS, self.periods as f64);

        let final_equity = self.final_equity.and_then(|e| f64::try_from(e).ok());
        let optional = [
            (FINAL_EQUITY, final_equity),
            (CAGR, self.cagr),
            (SHARPE_RATIO, self.sharpe_ratio),
            (CALMAR_RATIO, self.calmar_ratio),
            (PROFIT_FACTOR, self.profit_factor),
            (WIN_RATE, self.win_rate),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                eval.insert(name, value);
            }
        }

        eval
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        format!(
            "Return: {:.2}% | CAGR: {} | Sharpe: {} | Max DD: {:.2}% | PF: {}",
            self.total_return * 100.0,
            fmt_pct(self.cagr),
            fmt_num(self.sharpe_ratio),
            self.max_drawdown * 100.0,
            fmt_num(self.profit_factor),
        )
    }
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn fmt_num(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

struct EquityPath {
    curve: Vec<Decimal>,
    ruined: bool,
    overflowed: bool,
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics from per-period returns.
    ///
    /// Non-finite returns are treated as flat periods.
    pub fn from_returns(
        returns: &[f64],
        initial_equity: Decimal,
        periods_per_year: f64,
    ) -> PerformanceMetrics {
        let returns: Vec<f64> = returns
            .iter()
            .map(|r| if r.is_finite() { *r } else { 0.0 })
            .collect();

        let path = Self::equity_curve(&returns, initial_equity);
        let max_drawdown = Self::max_drawdown(&path.curve);

        let (final_equity, total_return) = if path.overflowed {
            // Growth only, since equity itself is not representable.
            let growth = returns.iter().fold(1.0_f64, |g, r| g * (1.0 + r));
            (None, growth - 1.0)
        } else {
            let final_equity = path.curve.last().copied().unwrap_or(initial_equity);
            let total_return = if initial_equity.is_zero() {
                0.0
            } else {
                let ratio = final_equity
                    .checked_div(initial_equity)
                    .and_then(|r| f64::try_from(r).ok());
                match ratio {
                    Some(ratio) => ratio - 1.0,
                    None => returns.iter().fold(1.0_f64, |g, r| g * (1.0 + r)) - 1.0,
                }
            };
            (Some(final_equity), total_return)
        };

        let (cagr, sharpe_ratio) = if path.ruined || path.overflowed {
            (None, None)
        } else {
            (
                Self::calculate_cagr(total_return, returns.len() + 1, periods_per_year),
                Self::calculate_sharpe(&returns, periods_per_year),
            )
        };

        let calmar_ratio = match cagr {
            Some(cagr) if max_drawdown > 0.0 => Some(cagr / max_drawdown),
            _ => None,
        };

        PerformanceMetrics {
            periods: returns.len(),
            total_return,
            cagr,
            sharpe_ratio,
            max_drawdown,
            calmar_ratio,
            profit_factor: Self::calculate_profit_factor(&returns),
            win_rate: Self::calculate_win_rate(&returns),
            final_equity,
            ruined: path.ruined,
        }
    }

    /// Compound returns into an equity curve starting at `initial`.
    ///
    /// Once equity reaches zero the path is ruined and stays at zero. If a
    /// growth factor or the product leaves the `Decimal` range the curve
    /// stops at the last representable point.
    fn equity_curve(returns: &[f64], initial: Decimal) -> EquityPath {
        let mut curve = Vec::with_capacity(returns.len() + 1);
        let mut equity = initial;
        let mut ruined = initial <= Decimal::ZERO;
        let mut overflowed = false;
        curve.push(equity);

        for (period, r) in returns.iter().enumerate() {
            if !ruined {
                let next = Decimal::try_from(1.0 + r)
                    .ok()
                    .and_then(|growth| equity.checked_mul(growth));
                match next {
                    Some(value) => equity = value,
                    None => {
                        debug!("Equity left Decimal range at period {}", period);
                        overflowed = true;
                        break;
                    }
                }
                if equity <= Decimal::ZERO {
                    equity = Decimal::ZERO;
                    ruined = true;
                }
            }
            curve.push(equity);
        }

        EquityPath {
            curve,
            ruined,
            overflowed,
        }
    }

    fn max_drawdown(curve: &[Decimal]) -> f64 {
        let mut peak = match curve.first() {
            Some(first) => *first,
            None => return 0.0,
        };
        let mut max_dd = 0.0_f64;

        for equity in curve {
            if *equity > peak {
                peak = *equity;
            } else if peak > Decimal::ZERO {
                let dd: f64 = ((peak - *equity) / peak).try_into().unwrap_or(0.0);
                max_dd = max_dd.max(dd);
            }
        }

        max_dd
    }

    /// Annualized growth over `observations` equity points.
    fn calculate_cagr(total_return: f64, observations: usize, periods_per_year: f64) -> Option<f64> {
        if observations < 2 || periods_per_year <= 0.0 {
            return None;
        }
        let growth = 1.0 + total_return;
        if growth <= 0.0 {
            return None;
        }
        Some(growth.powf(periods_per_year / observations as f64) - 1.0)
    }

    fn calculate_sharpe(returns: &[f64], periods_per_year: f64) -> Option<f64> {
        if returns.len() < 2 {
            return None;
        }
        let mean = returns.iter().mean();
        let std_dev = returns.iter().std_dev();

        if !std_dev.is_finite() || std_dev.abs() < f64::EPSILON {
            return None;
        }

        Some(mean / std_dev * periods_per_year.sqrt())
    }

    fn calculate_profit_factor(returns: &[f64]) -> Option<f64> {
        let gross_profit: f64 = returns.iter().filter(|r| **r > 0.0).sum();
        let gross_loss: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r.abs()).sum();

        if gross_loss == 0.0 {
            return None;
        }
        Some(gross_profit / gross_loss)
    }

    fn calculate_win_rate(returns: &[f64]) -> Option<f64> {
        let active = returns.iter().filter(|r| **r != 0.0).count();
        if active == 0 {
            return None;
        }
        let winners = returns.iter().filter(|r| **r > 0.0).count();
        Some(winners as f64 / active as f64)
    }
}
