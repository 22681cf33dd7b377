use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StepcastError>;

/// Short actionable message surfaced when a page agent never becomes reachable.
pub const PAGE_NOT_READY: &str = "content script not loaded, refresh the page";

/// Error taxonomy for the recording/playback core.
///
/// Cross-process handlers never propagate these across the message boundary;
/// they are folded into a `{success, error}` envelope. Only synchronous input
/// validation returns `Err` directly to the caller.
#[derive(Debug, Error)]
pub enum StepcastError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A step or control message arrived with no matching session. This is an
    /// expected race (a torn-down page reporting late), not an exception.
    #[error("no active recording session")]
    NoActiveSession,

    /// The remote process is unreachable or vanished mid-call.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("image processing failed: {0}")]
    Image(String),

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

pub(crate) fn invalid_argument(msg: impl Into<String>) -> StepcastError {
    StepcastError::InvalidArgument(msg.into())
}

pub(crate) fn not_found(msg: impl Into<String>) -> StepcastError {
    StepcastError::NotFound(msg.into())
}

pub(crate) fn transport_error(msg: impl Into<String>) -> StepcastError {
    StepcastError::Transport(msg.into())
}

pub(crate) fn image_error(err: image::ImageError) -> StepcastError {
    StepcastError::Image(err.to_string())
}
