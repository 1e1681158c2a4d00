//! Walk-forward orchestration.
//!
//! For each scheduled window: grid search on the in-sample slice, then score
//! the winning parameters on the out-of-sample slice. Windows are independent,
//! so they can run on a worker pool; results are always returned in window
//! order regardless of completion order.
//!
//! A panicking evaluator fails only its own window. The panic is caught after
//! the process panic hook has run, so the default hook still writes to stderr
//! unless the host installs its own; the reason is also delivered to
//! `ProgressObserver::on_window_panicked`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::data::{Bar, PriceSeries};
use crate::strategy::StrategyEvaluator;

use super::config::{ConfigError, WalkForwardConfig};
use super::grid::{ParameterGrid, ParameterRanges};
use super::progress::{NoopObserver, ProgressObserver};
use super::report::{WalkForwardReport, WindowResult};
use super::search::WindowOptimizer;
use super::windows::{WalkForwardWindow, WindowScheduler};

/// Walk-forward optimizer over one strategy evaluator.
pub struct WalkForwardOptimizer<E> {
    evaluator: E,
    config: WalkForwardConfig,
    ranges: ParameterRanges,
    observer: Arc<dyn ProgressObserver>,
}

impl<E: StrategyEvaluator> WalkForwardOptimizer<E> {
    /// Create a new optimizer with default configuration and no ranges.
    pub fn new(evaluator: E) -> Self {
        Self {
            evaluator,
            config: WalkForwardConfig::default(),
            ranges: ParameterRanges::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Set window sizing, metric and execution policy.
    pub fn with_config(mut self, config: WalkForwardConfig) -> Self {
        self.config = config;
        self
    }

    /// Set parameter ranges to search.
    pub fn with_ranges(mut self, ranges: ParameterRanges) -> Self {
        self.ranges = ranges;
        self
    }

    /// Set progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run walk-forward optimization over a validated series.
    pub fn optimize(&self, series: &PriceSeries) -> Result<WalkForwardReport, ConfigError> {
        info!(
            "Walk-forward optimization of {} on {} ({} observations)",
            self.evaluator.name(),
            series.symbol(),
            series.len()
        );
        self.optimize_bars(series.bars())
    }

    /// Run walk-forward optimization over chronologically ordered bars.
    ///
    /// Configuration problems fail the whole run. Problems inside a window
    /// are recorded on that window's result and never abort the others.
    pub fn optimize_bars(&self, bars: &[Bar]) -> Result<WalkForwardReport, ConfigError> {
        self.config.validate()?;
        self.ranges.validate(self.evaluator.accepted_parameters())?;

        let scheduler = WindowScheduler::new(
            self.config.in_sample_size,
            self.config.out_sample_size,
            self.config.step_size,
        );
        let windows = scheduler.generate(bars);
        let grid = self.ranges.grid();

        info!("Generated {} walk-forward windows", windows.len());
        info!("Parameter combinations: {}", grid.len());
        self.observer.on_run_started(windows.len(), grid.len());

        let results: Vec<WindowResult> = if self.config.parallel && windows.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.worker_count)
                .build()
                .map_err(|e| ConfigError::WorkerPool(e.to_string()))?;

            // Indexed collect keeps window order.
            pool.install(|| {
                windows
                    .par_iter()
                    .map(|window| self.run_window(window, &grid))
                    .collect()
            })
        } else {
            windows
                .iter()
                .map(|window| self.run_window(window, &grid))
                .collect()
        };

        let report = WalkForwardReport::new(
            self.config.optimization_metric,
            self.ranges.names(),
            results,
        );
        self.observer.on_run_completed(&report);

        Ok(report)
    }

    fn run_window(&self, window: &WalkForwardWindow<'_>, grid: &ParameterGrid) -> WindowResult {
        self.observer.on_window_started(window);

        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.optimize_window(window, grid))) {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                self.observer.on_window_panicked(window.index, &reason);
                WindowResult::evaluation_failed(window, reason, None, None, grid.len())
            }
        };

        self.observer.on_window_completed(&result);
        result
    }

    fn optimize_window(&self, window: &WalkForwardWindow<'_>, grid: &ParameterGrid) -> WindowResult {
        let metric = self.config.optimization_metric;
        let search = WindowOptimizer::new(&self.evaluator, metric)
            .with_parallel(self.config.parallel_grid)
            .optimize(window.in_sample, grid);

        let Some((_, params)) = search.best else {
            if search.all_failed() {
                let reason = search
                    .first_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "every evaluation failed".to_string());
                return WindowResult::evaluation_failed(window, reason, None, None, search.evaluated);
            }
            return WindowResult::no_valid_parameters(window, search.evaluated);
        };

        match self.evaluator.evaluate(window.out_sample, &params) {
            Ok(evaluation) => {
                let out_score = metric.score(&evaluation);
                debug!(
                    "Window {}: {} IS={:?} OOS={:?}",
                    window.index, params, search.best_score, out_score
                );
                WindowResult::optimized(
                    window,
                    params,
                    search.best_score,
                    out_score,
                    evaluation,
                    search.evaluated,
                )
            }
            Err(e) => WindowResult::evaluation_failed(
                window,
                format!("out-of-sample: {}", e),
                Some(params),
                search.best_score,
                search.evaluated,
            ),
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("evaluator panicked: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::metric::{SHARPE_RATIO, TOTAL_RETURN};
    use crate::metrics::{Evaluation, OptimizationMetric};
    use crate::strategy::moving_average::{FAST_MA, SLOW_MA};
    use crate::strategy::{EvaluationError, MovingAverageCrossover};
    use crate::walkforward::grid::ParameterSet;
    use crate::walkforward::report::WindowStatus;
    use chrono::{Duration, NaiveDate};
    use std::sync::Mutex;

    fn series(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let bars = (0..n)
            .map(|i| {
                let t = i as f64;
                let close = 100.0 + t * 0.05 + (t / 9.0).sin() * 4.0 + (t / 23.0).cos() * 2.5;
                Bar::from_close(start + Duration::days(i as i64), close)
            })
            .collect();
        PriceSeries::new("TEST", bars).unwrap()
    }

    fn ma_ranges() -> ParameterRanges {
        ParameterRanges::new()
            .with(FAST_MA, [2_i64, 5, 10])
            .with(SLOW_MA, [20_i64, 30, 50])
    }

    /// Score is `x` scaled by slice length, so it is defined on both slices.
    fn linear_evaluator(
        bars: &[Bar],
        params: &ParameterSet,
    ) -> Result<Evaluation, EvaluationError> {
        let x = params
            .get_f64("x")
            .ok_or_else(|| EvaluationError::MissingParameter("x".into()))?;
        Ok(Evaluation::new().with(TOTAL_RETURN, x / bars.len() as f64))
    }

    fn x_ranges() -> ParameterRanges {
        ParameterRanges::new().with("x", [1_i64, 3, 2])
    }

    #[derive(Default)]
    struct RecordingObserver {
        started: Mutex<Vec<(usize, usize)>>,
        completed: Mutex<Vec<usize>>,
        panicked: Mutex<Vec<(usize, String)>>,
    }

    impl ProgressObserver for RecordingObserver {
        fn on_run_started(&self, windows: usize, combinations: usize) {
            self.started.lock().unwrap().push((windows, combinations));
        }

        fn on_window_completed(&self, result: &WindowResult) {
            self.completed.lock().unwrap().push(result.window);
        }

        fn on_window_panicked(&self, window: usize, reason: &str) {
            self.panicked.lock().unwrap().push((window, reason.to_string()));
        }
    }

    #[test]
    fn test_window_count_and_order() {
        let data = series(1000);
        let report = WalkForwardOptimizer::new(linear_evaluator)
            .with_config(WalkForwardConfig::new(252, 63, 63).with_metric(OptimizationMetric::TotalReturn))
            .with_ranges(x_ranges())
            .optimize(&data)
            .unwrap();

        assert_eq!(report.len(), 11);
        let indices: Vec<usize> = report.windows().iter().map(|w| w.window).collect();
        assert_eq!(indices, (1..=11).collect::<Vec<_>>());
        assert!(report
            .windows()
            .windows(2)
            .all(|pair| pair[0].start_date < pair[1].start_date));
        for w in report.windows() {
            assert_eq!(w.status, WindowStatus::Optimized);
            assert_eq!(w.params.as_ref().unwrap().get_i64("x"), Some(3));
            assert_eq!(w.combinations_evaluated, 3);
        }
    }

    #[test]
    fn test_degradation_is_exact_difference() {
        let data = series(400);
        let report = WalkForwardOptimizer::new(MovingAverageCrossover::default())
            .with_config(WalkForwardConfig::new(120, 40, 40))
            .with_ranges(ma_ranges())
            .optimize(&data)
            .unwrap();

        assert!(!report.is_empty());
        for w in report.windows() {
            if let (Some(is), Some(oos)) = (w.in_sample_score, w.out_sample_score) {
                assert_eq!(w.degradation, Some(is - oos));
                assert_eq!(w.out_sample_metrics.get(SHARPE_RATIO), Some(oos));
            } else {
                assert_eq!(w.degradation, None);
            }
        }
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let data = series(500);
        let optimizer = WalkForwardOptimizer::new(MovingAverageCrossover::default())
            .with_config(WalkForwardConfig::new(150, 50, 25))
            .with_ranges(ma_ranges());

        let first = optimizer.optimize(&data).unwrap().to_json().unwrap();
        let second = optimizer.optimize(&data).unwrap().to_json().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let data = series(500);
        let sequential = WalkForwardOptimizer::new(MovingAverageCrossover::default())
            .with_config(WalkForwardConfig::new(150, 50, 25))
            .with_ranges(ma_ranges())
            .optimize(&data)
            .unwrap();
        let parallel = WalkForwardOptimizer::new(MovingAverageCrossover::default())
            .with_config(
                WalkForwardConfig::new(150, 50, 25)
                    .with_parallel(3)
                    .with_parallel_grid(true),
            )
            .with_ranges(ma_ranges())
            .optimize(&data)
            .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_short_series_gives_empty_report() {
        let data = series(300);
        let report = WalkForwardOptimizer::new(MovingAverageCrossover::default())
            .with_config(WalkForwardConfig::new(252, 63, 21))
            .with_ranges(ma_ranges())
            .optimize(&data)
            .unwrap();

        assert!(report.is_empty());
        assert!(!report.all_degenerate());
    }

    #[test]
    fn test_unmeasurable_everywhere_is_all_degenerate() {
        let evaluator = |_bars: &[Bar], _params: &ParameterSet| -> Result<Evaluation, EvaluationError> {
            Ok(Evaluation::new().with(TOTAL_RETURN, 0.1))
        };
        let data = series(200);
        let report = WalkForwardOptimizer::new(evaluator)
            .with_config(WalkForwardConfig::new(50, 25, 25).with_metric(OptimizationMetric::ProfitFactor))
            .with_ranges(x_ranges())
            .optimize(&data)
            .unwrap();

        assert_eq!(report.len(), 6);
        assert!(report.all_degenerate());
        for w in report.windows() {
            assert_eq!(w.status, WindowStatus::NoValidParameters);
            assert!(w.params.is_none());
            assert_eq!(w.in_sample_score, None);
        }
    }

    #[test]
    fn test_panicking_window_is_isolated() {
        let data = series(200);
        let poisoned = data.bars()[50].date;
        let evaluator = move |bars: &[Bar], params: &ParameterSet| -> Result<Evaluation, EvaluationError> {
            if bars[0].date == poisoned {
                panic!("bad slice");
            }
            linear_evaluator(bars, params)
        };

        let report = WalkForwardOptimizer::new(evaluator)
            .with_config(WalkForwardConfig::new(50, 25, 25).with_metric(OptimizationMetric::TotalReturn))
            .with_ranges(x_ranges())
            .optimize(&data)
            .unwrap();

        // Window 3 starts at offset 50 in sample; window 1's out-of-sample
        // slice starts at offset 50 too.
        assert_eq!(report.len(), 6);
        for w in report.windows() {
            match w.window {
                1 | 3 => match &w.status {
                    WindowStatus::EvaluationFailed { reason } => {
                        assert!(reason.contains("bad slice"), "{}", reason)
                    }
                    other => panic!("window {} unexpectedly {:?}", w.window, other),
                },
                _ => assert_eq!(w.status, WindowStatus::Optimized),
            }
        }
        assert_eq!(report.degenerate_count(), 2);
    }

    #[test]
    fn test_out_of_sample_error_keeps_selection() {
        let evaluator = |bars: &[Bar], params: &ParameterSet| -> Result<Evaluation, EvaluationError> {
            if bars.len() < 50 {
                return Err(EvaluationError::InsufficientData {
                    expected: 50,
                    actual: bars.len(),
                });
            }
            linear_evaluator(bars, params)
        };
        let data = series(150);
        let report = WalkForwardOptimizer::new(evaluator)
            .with_config(WalkForwardConfig::new(100, 25, 25).with_metric(OptimizationMetric::TotalReturn))
            .with_ranges(x_ranges())
            .optimize(&data)
            .unwrap();

        assert_eq!(report.len(), 2);
        for w in report.windows() {
            assert!(matches!(w.status, WindowStatus::EvaluationFailed { .. }));
            assert_eq!(w.params.as_ref().unwrap().get_i64("x"), Some(3));
            assert_eq!(w.in_sample_score, Some(0.03));
            assert_eq!(w.out_sample_score, None);
            assert_eq!(w.degradation, None);
        }
    }

    #[test]
    fn test_all_errors_in_sample_fail_window() {
        let evaluator = |_bars: &[Bar], _params: &ParameterSet| -> Result<Evaluation, EvaluationError> {
            Err(EvaluationError::Failed("no data source".into()))
        };
        let report = WalkForwardOptimizer::new(evaluator)
            .with_config(WalkForwardConfig::new(50, 25, 25))
            .with_ranges(x_ranges())
            .optimize(&series(100))
            .unwrap();

        assert_eq!(report.len(), 2);
        assert!(report.all_degenerate());
        assert_eq!(
            report.windows()[0].status,
            WindowStatus::EvaluationFailed {
                reason: "Evaluation failed: no data source".into()
            }
        );
    }

    #[test]
    fn test_configuration_errors_fail_run() {
        let data = series(400);

        let err = WalkForwardOptimizer::new(MovingAverageCrossover::default())
            .with_config(WalkForwardConfig::new(120, 40, 0))
            .with_ranges(ma_ranges())
            .optimize(&data)
            .unwrap_err();
        assert_eq!(err, ConfigError::NonPositive { field: "step_size" });

        let err = WalkForwardOptimizer::new(MovingAverageCrossover::default())
            .with_config(WalkForwardConfig::new(120, 40, 40))
            .with_ranges(ma_ranges().with("stop_loss", [0.02]))
            .optimize(&data)
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownParameter("stop_loss".into()));

        let err = WalkForwardOptimizer::new(MovingAverageCrossover::default())
            .with_config(WalkForwardConfig::new(120, 40, 40))
            .optimize(&data)
            .unwrap_err();
        assert_eq!(err, ConfigError::NoParameters);
    }

    #[test]
    fn test_observer_sees_every_window() {
        let observer = Arc::new(RecordingObserver::default());
        let data = series(400);

        let report = WalkForwardOptimizer::new(MovingAverageCrossover::default())
            .with_config(WalkForwardConfig::new(120, 40, 40).with_parallel(2))
            .with_ranges(ma_ranges())
            .with_observer(observer.clone())
            .optimize(&data)
            .unwrap();

        assert_eq!(*observer.started.lock().unwrap(), vec![(report.len(), 9)]);
        let mut completed = observer.completed.lock().unwrap().clone();
        completed.sort_unstable();
        assert_eq!(completed, (1..=report.len()).collect::<Vec<_>>());
        assert!(observer.panicked.lock().unwrap().is_empty());
    }

    #[test]
    fn test_observer_receives_panic_reason() {
        let observer = Arc::new(RecordingObserver::default());
        let data = series(200);
        let poisoned = data.bars()[100].date;
        let evaluator = move |bars: &[Bar], params: &ParameterSet| -> Result<Evaluation, EvaluationError> {
            if bars[0].date == poisoned {
                panic!("bad slice");
            }
            linear_evaluator(bars, params)
        };

        WalkForwardOptimizer::new(evaluator)
            .with_config(WalkForwardConfig::new(50, 25, 25).with_metric(OptimizationMetric::TotalReturn))
            .with_ranges(x_ranges())
            .with_observer(observer.clone())
            .optimize(&data)
            .unwrap();

        // Offset 100 is window 3's out-of-sample start and window 5's in-sample start.
        let mut panicked = observer.panicked.lock().unwrap().clone();
        panicked.sort();
        assert_eq!(panicked.len(), 2);
        assert_eq!(panicked[0].0, 3);
        assert_eq!(panicked[1].0, 5);
        assert!(panicked
            .iter()
            .all(|(_, reason)| reason == "evaluator panicked: bad slice"));
    }
}
