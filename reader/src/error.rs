use speech_core::NarrationError;
use thiserror::Error;

/// Reader error types
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Story error: {0}")]
    Story(#[from] anyhow::Error),

    #[error("Export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Speech(#[from] NarrationError),
}

impl ReaderError {
    /// Whether the command can simply be retried later.
    pub fn is_busy(&self) -> bool {
        matches!(self, ReaderError::Speech(NarrationError::Busy))
    }
}
