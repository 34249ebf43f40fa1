use thiserror::Error;

/// Reasons a user submit is refused. None of them add anything to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("message is empty")]
    InvalidInput,
    #[error("a reply is still pending")]
    Busy,
    #[error("the conversation has ended")]
    Ended,
}

/// Responder failures. The state machine treats every variant the same way;
/// the split only exists for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("responder returned HTTP {status}")]
    Status { status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("responder reported success=false")]
    Rejected,
    #[error("malformed responder body: {0}")]
    Malformed(String),
}

/// Storage failures. Always swallowed by the session.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage backend error: {0}")]
    Backend(String),
}
