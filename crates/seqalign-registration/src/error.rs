//! Error types for registration and reference selection.

use seqalign_core::CoreError;
use thiserror::Error;

/// Failures of reference selection, metric evaluation and optimization.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Parameter, scale or pyramid level counts disagree.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The optimizer could not produce a usable transform.
    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),

    /// The metric could not be evaluated, e.g. no sample overlaps the moving image.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// None of the scans in a batch could be loaded.
    #[error("No readable scans among {0} paths")]
    EmptyBatch(usize),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    pub fn optimization_failed(msg: impl Into<String>) -> Self {
        Self::OptimizationFailed(msg.into())
    }

    pub fn numerical_instability(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistrationError::numerical_instability("no sample maps inside the moving image");
        assert_eq!(
            err.to_string(),
            "Numerical instability: no sample maps inside the moving image"
        );
        assert_eq!(RegistrationError::EmptyBatch(3).to_string(), "No readable scans among 3 paths");
    }

    #[test]
    fn test_core_errors_convert() {
        let err: RegistrationError = CoreError::range_configuration("both given").into();
        assert!(matches!(err, RegistrationError::Core(CoreError::RangeConfiguration(_))));
        assert_eq!(err.to_string(), "Invalid range configuration: both given");
    }
}
