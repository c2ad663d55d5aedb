use thiserror::Error;

/// Errors produced by the courier routing core.
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A metadata key the caller depends on is absent or empty.
    #[error("missing or invalid metadata: {0}")]
    MissingMeta(String),

    /// No session is cached for the connection id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Any session-storage failure other than a miss.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("unregistered command: {0}")]
    UnregisteredCommand(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl CourierError {
    /// True for the distinguished "no session for this channel" miss.
    pub fn is_session_not_found(&self) -> bool {
        matches!(self, CourierError::SessionNotFound(_))
    }
}

impl From<ciborium::de::Error<std::io::Error>> for CourierError {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        CourierError::Codec(e.to_string())
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for CourierError {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        CourierError::Codec(e.to_string())
    }
}

pub type CourierResult<T> = Result<T, CourierError>;
