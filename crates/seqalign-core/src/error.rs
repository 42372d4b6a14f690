//! Error type shared by the image, transform and filter layers.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Mutually exclusive resampling arguments were both given, or neither was.
    #[error("Invalid range configuration: {0}")]
    RangeConfiguration(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A volume's backing files could not be read as a coherent image.
    #[error("Failed to load volume from {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Failed to write volume to {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

impl CoreError {
    pub fn range_configuration(msg: impl Into<String>) -> Self {
        Self::RangeConfiguration(msg.into())
    }

    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    pub fn load(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
