use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Recording has no steps to save")]
    EmptyRecording,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid step: {0}")]
    InvalidStep(String),

    #[error("Unsupported action '{action}' at step {index}")]
    UnsupportedAction { index: usize, action: String },

    #[error("Step {index} failed: {message}")]
    StepExecution { index: usize, message: String },

    #[error("Capture channel disconnected: {0}")]
    ChannelDisconnected(String),

    #[error("Browser driver error: {0}")]
    Driver(String),
}

pub type Result<T> = std::result::Result<T, TestflowError>;
