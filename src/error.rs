// src/error.rs

use thiserror::Error;

/// Errors produced by the forecasting pipeline.
///
/// All three kinds propagate out of the pipeline unhandled; no stage
/// retries with different orders or re-draws failed simulations.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Input series shorter than the minimum required for the requested
    /// model order. The caller can supply more history or a smaller order.
    #[error("insufficient data: need at least {required} observations, got {got}")]
    InsufficientData { required: usize, got: usize },

    /// Numerical fitting failure: non-convergence, singular system,
    /// non-stationary specification. Fatal to the run.
    #[error("model fit failed: {0}")]
    ModelFit(String),

    /// A computed forecast or aggregated band violates a structural
    /// invariant (negative variance, crossed band, non-finite value).
    /// Halts the run; no partial band is emitted.
    #[error("validation failed: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
