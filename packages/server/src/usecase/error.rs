//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{NicknameError, RegistryError};

/// Reason a connection was turned away during the join phase.
///
/// The `Display` text is what the client receives before the connection closes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinRejection {
    #[error("Join failed, received message: {0}")]
    Malformed(String),

    #[error("Join failed, invalid nickname: {0}")]
    InvalidNickname(#[from] NicknameError),

    #[error("Join failed, too many users connected ({0})")]
    TooManyUsers(usize),

    #[error("Join failed, nickname not available")]
    NicknameTaken,

    #[error("Join failed, internal server error")]
    Internal,
}

impl From<RegistryError> for JoinRejection {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::TooManyUsers { max } => JoinRejection::TooManyUsers(max),
            RegistryError::NicknameTaken(_) => JoinRejection::NicknameTaken,
            RegistryError::UserNotFound(_)
            | RegistryError::AlreadyJoined(_)
            | RegistryError::QueueClosed => JoinRejection::Internal,
        }
    }
}
