use uuid::Uuid;

/// A custom error type for engine validation failures.
///
/// Every variant is recoverable: the caller re-queries the conversation
/// state and retries with corrected input. No variant leaves the aggregate
/// partially mutated.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("it is turn {expected}, not turn {got}")]
    WrongTurn { expected: u32, got: u32 },
    #[error("it is not your turn: {0}")]
    RoleMismatch(String),
    #[error("turn {0} already has a response")]
    AlreadySubmitted(u32),
    #[error("conversation is already completed")]
    ConversationCompleted,
    #[error("conversation '{0}' not found")]
    ConversationNotFound(Uuid),
}
