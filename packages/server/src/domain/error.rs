//! Domain error types.

use thiserror::Error;

use super::ConnectionId;

/// Errors returned by [`UserRegistry`](super::UserRegistry) operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry already holds `max` members.
    #[error("Too many users connected ({max})")]
    TooManyUsers { max: usize },

    /// Another member (or the server itself) already uses this nickname.
    #[error("Nickname '{0}' is not available")]
    NicknameTaken(String),

    /// No member owns the given connection.
    #[error("No user registered for connection {0}")]
    UserNotFound(ConnectionId),

    /// The connection already owns a member.
    #[error("Connection {0} has already joined")]
    AlreadyJoined(ConnectionId),

    /// The broadcast queue consumer is gone, announcements cannot be emitted.
    #[error("Broadcast queue is closed")]
    QueueClosed,
}

/// Errors returned when validating a nickname.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NicknameError {
    #[error("nickname is empty")]
    Empty,

    #[error("nickname is longer than {max} characters")]
    TooLong { max: usize },

    #[error("nickname contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Errors returned by the broadcast queue.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("message queue is closed")]
    Closed,
}

impl From<QueueError> for RegistryError {
    fn from(_: QueueError) -> Self {
        RegistryError::QueueClosed
    }
}
