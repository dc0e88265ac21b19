use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("lock failed: {0}")]
    Lock(String),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("quality {0} is outside the 0-5 scale")]
    InvalidQuality(u8),
    #[error("invalid item progress: {0}")]
    InvalidProgress(String),
    #[error("outcome label {0} must be 0 (remembered) or 1 (forgotten)")]
    InvalidLabel(u8),
    #[error("invalid feature value: {0}")]
    InvalidFeature(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("predictor already trained on {sample_count} samples")]
    AlreadyTrained { sample_count: u64 },
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}
