//! Model selection: hyperparameter search, cross-validation, metrics

pub mod cross_validation;
pub mod grid;
pub mod grid_search;
pub mod metrics;

pub use cross_validation::{k_fold, CVSplit};
pub use grid::{GridAxis, GridPoint, HyperGrid};
pub use grid_search::{grid_search, PointResult, SearchError, SearchOutcome};
pub use metrics::{evaluate, ClassMetrics, Evaluation, ScoreSummary};
