use thiserror::Error;

#[derive(Error, Debug)]
pub enum CltvError {
    #[error("Data quality error: {0}")]
    DataQuality(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Optimizer did not converge for {model}: {reason}")]
    Convergence { model: &'static str, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CltvResult<T> = Result<T, CltvError>;
