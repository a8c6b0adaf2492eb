use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("text detection is not available (tesseract not installed)")]
    DetectionUnavailable,

    #[error("text detection failed: {0}")]
    DetectionFailed(String),

    #[error("preferred font unavailable, using fallback: {0}")]
    RenderingDegraded(String),

    #[error("failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("failed to encode image: {0}")]
    EncodeFailed(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
