use thiserror::Error;

/// Top-level failure taxonomy for the cell. Subsystems carry their own error
/// enums; everything user-visible in a job report converges here.
#[derive(Debug, Error)]
pub enum CellError {
    #[error("Tool attach failed: {0}")]
    ToolAttachFailed(String),

    #[error("No coordination data for shape '{0}'")]
    UnknownShape(String),

    #[error("Device unavailable: {device}")]
    DeviceUnavailable { device: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}
