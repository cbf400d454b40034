/// Errors from the altitude estimators.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq)]
pub enum EstimateError {
    /// Sample period must be finite and strictly positive.
    #[error("invalid sample period {dt} s")]
    InvalidPeriod { dt: f64 },

    /// A measurement was NaN or infinite.
    #[error("non-finite {name} measurement")]
    NonFinite { name: &'static str },

    /// Smoothing factor must lie in (0, 1].
    #[error("smoothing factor {alpha} outside (0, 1]")]
    InvalidSmoothing { alpha: f64 },
}

/// Result type alias for estimation operations.
pub type Result<T> = std::result::Result<T, EstimateError>;
