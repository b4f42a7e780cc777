use thiserror::Error;

/// Failure to decode a routing update payload.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid update payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("update payload has no origin router")]
    MissingOrigin,
}

pub type Result<T> = std::result::Result<T, CodecError>;
