//! Cross-window analysis of walk-forward reports.
//!
//! Everything here is derived from a finished `WalkForwardReport`; nothing
//! is stored back on it.

pub mod robust;
pub mod sensitivity;
pub mod stats;
pub mod summary;

pub use robust::{AggregationMethod, RobustParameters};
pub use sensitivity::{render_sensitivity, sensitivity, write_sensitivity_csv, SensitivityRecord};
pub use summary::{ParameterStability, ReportSummary, ScoreStats};
