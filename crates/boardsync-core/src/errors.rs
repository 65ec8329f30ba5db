/// Errors surfaced to callers of the relay.
///
/// Storage and delivery failures are deliberately absent: they are logged and
/// counted by the relay, never returned to the update caller.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("relay is shutting down")]
    ShuttingDown,
}

impl RelayError {
    /// Whether the caller sent something wrong (maps to a 4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedInput(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed_input",
            Self::ShuttingDown => "shutting_down",
        }
    }
}
