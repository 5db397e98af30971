//! Error types for the room coordinator.

/// Errors decoding a data message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown message label: {0}")]
    UnknownLabel(String),

    #[error("invalid {label} payload: {reason}")]
    InvalidPayload { label: String, reason: String },

    #[error("invalid targets: {0}")]
    InvalidTargets(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RoomError {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend returned HTTP {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("join not confirmed after {0}s")]
    JoinTimeout(u64),

    #[error("not joined to a room")]
    NotJoined,

    #[error("session is {0}")]
    InvalidState(String),

    #[error("{action} requires the host role")]
    Unauthorized { action: &'static str },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<reqwest::Error> for RoomError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RoomError::Parse(err.to_string())
        } else {
            RoomError::Network(err.to_string())
        }
    }
}

impl RoomError {
    /// Whether trying the same call again could succeed. Client-side
    /// rejections (4xx other than timeouts and rate limits), bad payloads,
    /// and authorization failures are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            RoomError::Network(_) | RoomError::Transport(_) | RoomError::JoinTimeout(_) => true,
            RoomError::Backend { status, .. } => {
                *status >= 500 || matches!(*status, 408 | 429)
            }
            RoomError::Parse(_)
            | RoomError::NotJoined
            | RoomError::InvalidState(_)
            | RoomError::Unauthorized { .. }
            | RoomError::Protocol(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RoomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_names_the_action() {
        let err = RoomError::Unauthorized {
            action: "approve speaker",
        };
        assert_eq!(err.to_string(), "approve speaker requires the host role");
    }

    #[test]
    fn backend_error_display() {
        let err = RoomError::Backend {
            status: 500,
            body: "Failed to create room".into(),
        };
        assert_eq!(
            err.to_string(),
            "backend returned HTTP 500: Failed to create room"
        );
    }

    #[test]
    fn retryable_errors() {
        let backend = |status| RoomError::Backend {
            status,
            body: String::new(),
        };
        assert!(RoomError::Network("down".into()).is_retryable());
        assert!(RoomError::JoinTimeout(10).is_retryable());
        assert!(backend(503).is_retryable());
        assert!(backend(429).is_retryable());
        assert!(!backend(401).is_retryable());
        assert!(!backend(404).is_retryable());
        assert!(!RoomError::Parse("bad json".into()).is_retryable());
        assert!(!RoomError::Unauthorized { action: "join" }.is_retryable());
    }

    #[test]
    fn protocol_error_is_transparent() {
        let err: RoomError = ProtocolError::UnknownLabel("confetti".into()).into();
        assert_eq!(err.to_string(), "unknown message label: confetti");
    }
}
