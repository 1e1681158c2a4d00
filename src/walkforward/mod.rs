//! Walk-forward optimization.
//!
//! Rolls an in-sample/out-of-sample window pair across a series:
//! - In-sample: exhaustive grid search for the best parameters
//! - Out-of-sample: the chosen parameters scored on unseen data
//! - Roll: advance by a fixed number of observations

pub mod config;
pub mod grid;
pub mod optimizer;
pub mod progress;
pub mod report;
pub mod search;
pub mod windows;

pub use config::{ConfigError, WalkForwardConfig};
pub use grid::{ParamValue, ParameterGrid, ParameterRange, ParameterRanges, ParameterSet};
pub use optimizer::WalkForwardOptimizer;
pub use progress::{NoopObserver, ProgressObserver, TracingObserver};
pub use report::{ExportError, ReportTable, WalkForwardReport, WindowResult, WindowStatus};
pub use search::{CandidateScore, SearchOutcome, WindowOptimizer};
pub use windows::{WalkForwardWindow, WindowBounds, WindowScheduler};
