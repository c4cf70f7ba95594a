use crate::state::Who;

/// Failure categories surfaced by the engine.
///
/// `Internal` is an engine defect and is never recovered from. `Io` marks a
/// player whose decision channel failed or answered out of range; the game
/// loop turns it into a forfeit. `Data` means the rule catalogue referenced
/// something it does not define.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("internal engine error: {0}")]
    Internal(String),
    #[error("io error from {who:?}: {message}")]
    Io { who: Who, message: String },
    #[error("rule data error: {0}")]
    Data(String),
}

impl EngineError {
    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal(message.into())
    }

    pub fn io(who: Who, message: impl Into<String>) -> Self {
        EngineError::Io {
            who,
            message: message.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        EngineError::Data(message.into())
    }

    pub fn is_io(&self) -> bool {
        matches!(self, EngineError::Io { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
