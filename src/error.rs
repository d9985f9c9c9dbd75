use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dropout ratio must lie strictly between 0 and 1, got {0}")]
    InvalidRatio(f32),

    #[error("Layer error: {0}")]
    Layer(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("Unsupported phase: {0}")]
    UnsupportedPhase(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
