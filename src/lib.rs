pub mod analysis;
pub mod data;
pub mod metrics;
pub mod strategy;
pub mod walkforward;

// Re-export commonly used types
pub use analysis::{AggregationMethod, ReportSummary, RobustParameters, SensitivityRecord};
pub use data::{Bar, PriceSeries};
pub use metrics::{Evaluation, MetricsCalculator, OptimizationMetric, PerformanceMetrics};
pub use strategy::{EvaluationError, MovingAverageCrossover, StrategyEvaluator};
pub use walkforward::{
    ConfigError, ParameterRanges, ParameterSet, WalkForwardConfig, WalkForwardOptimizer,
    WalkForwardReport, WindowResult, WindowStatus,
};
