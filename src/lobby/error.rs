//! Lobby error kinds.
//!
//! Every core operation returns one of these immediately; nothing is coerced
//! into a default value and nothing is retried internally. The transport
//! layer owns the mapping to caller-visible status codes.

/// Lobby errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// Referenced session does not exist (including already destroyed).
    #[error("Session not found")]
    SessionNotFound,

    /// Join attempted on a four-member session.
    #[error("Session is full")]
    SessionFull,

    /// Join attempted by a member already present.
    #[error("User already joined")]
    AlreadyJoined,

    /// Operation referenced a user not in this session.
    #[error("User not found")]
    UserNotFound,

    /// Join attempted on a session that has already started.
    #[error("Session already started")]
    SessionStarted,

    /// Gameplay delegation attempted before the session started.
    #[error("Game not started")]
    GameNotStarted,

    /// All four seats occupied. Unreachable behind the `SessionFull` guard;
    /// hitting it indicates a bug upstream, not bad caller input.
    #[error("No seat available")]
    NoSeatAvailable,
}
