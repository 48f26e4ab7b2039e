//! Server configuration and limits.

use thiserror::Error;

use crate::domain::{Nickname, NicknameError};

pub const DEFAULT_MAX_USERS: usize = 32;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;
pub const DEFAULT_MAX_NICKNAME_LEN: usize = 32;
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;
pub const DEFAULT_SERVER_NICKNAME: &str = "SERVER";

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid server nickname: {0}")]
    ServerNickname(#[from] NicknameError),
}

/// Limits and names used by a running server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Maximum number of joined users
    pub max_users: usize,
    /// Pending broadcast messages before producers wait
    pub queue_capacity: usize,
    /// Longest accepted line in bytes; longer lines are truncated
    pub max_line_len: usize,
    /// Longest nickname in characters
    pub max_nickname_len: usize,
    /// Lines buffered per connection before a writer waits
    pub outbound_buffer: usize,
    /// Sender name of server-originated lines, reserved for clients
    pub server_nickname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_users: DEFAULT_MAX_USERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            max_nickname_len: DEFAULT_MAX_NICKNAME_LEN,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            server_nickname: DEFAULT_SERVER_NICKNAME.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("max_users", self.max_users),
            ("queue_capacity", self.queue_capacity),
            ("max_line_len", self.max_line_len),
            ("max_nickname_len", self.max_nickname_len),
            ("outbound_buffer", self.outbound_buffer),
        ];
        if let Some(&(name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(name));
        }
        Nickname::parse(&self.server_nickname, usize::MAX)?;
        Ok(())
    }
}
