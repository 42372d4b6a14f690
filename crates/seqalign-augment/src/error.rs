use seqalign_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AugmentError>;

#[derive(Error, Debug)]
pub enum AugmentError {
    /// A sampling range that would yield meaningless filter parameters.
    #[error("Invalid augmentation range '{name}': {reason}")]
    InvalidRange { name: &'static str, reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AugmentError {
    pub fn invalid_range(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            name,
            reason: reason.into(),
        }
    }
}
