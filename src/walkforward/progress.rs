//! Run progress notifications.

use tracing::{error, info, warn};

use super::report::{WalkForwardReport, WindowResult, WindowStatus};
use super::windows::WalkForwardWindow;

/// Receives progress events from a walk-forward run.
///
/// In parallel runs the window callbacks arrive from worker threads and in
/// completion order, not window order.
pub trait ProgressObserver: Send + Sync {
    fn on_run_started(&self, _windows: usize, _combinations: usize) {}

    fn on_window_started(&self, _window: &WalkForwardWindow<'_>) {}

    /// An evaluator panicked inside `window`. Called before the window's
    /// `on_window_completed`.
    fn on_window_panicked(&self, _window: usize, _reason: &str) {}

    fn on_window_completed(&self, _result: &WindowResult) {}

    fn on_run_completed(&self, _report: &WalkForwardReport) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Logs progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_run_started(&self, windows: usize, combinations: usize) {
        info!(
            "Walk-forward run: {} windows x {} combinations",
            windows, combinations
        );
    }

    fn on_window_started(&self, window: &WalkForwardWindow<'_>) {
        info!(
            "Processing window {}: IS {} to {}, OOS {} to {}",
            window.index,
            window.start_date(),
            window.in_sample_end(),
            window.out_sample_start(),
            window.end_date()
        );
    }

    fn on_window_panicked(&self, window: usize, reason: &str) {
        error!("  Window {}: {}", window, reason);
    }

    fn on_window_completed(&self, result: &WindowResult) {
        match &result.status {
            WindowStatus::Optimized => info!(
                "  Window {}: {} IS={} OOS={}",
                result.window,
                result
                    .params
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                fmt_score(result.in_sample_score),
                fmt_score(result.out_sample_score)
            ),
            WindowStatus::NoValidParameters => {
                warn!("  Window {}: no valid parameters", result.window)
            }
            WindowStatus::EvaluationFailed { reason } => {
                warn!("  Window {}: evaluation failed: {}", result.window, reason)
            }
        }
    }

    fn on_run_completed(&self, report: &WalkForwardReport) {
        info!(
            "Walk-forward complete: {} windows, {} degenerate",
            report.len(),
            report.degenerate_count()
        );
    }
}

fn fmt_score(score: Option<f64>) -> String {
    score
        .map(|s| format!("{:.4}", s))
        .unwrap_or_else(|| "n/a".to_string())
}
