//! Value objects and entities of the chat engine.

use std::{fmt, net::SocketAddr};

use tokio::sync::mpsc;

use super::{NicknameError, protocol};

/// Channel feeding one connection's outbound pusher task.
///
/// Every line sent on it is written to the peer in channel order.
pub type PusherChannel = mpsc::Sender<String>;

/// Opaque handle identifying one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Validated nickname.
///
/// Non-empty, at most `max_len` characters, and free of whitespace, control
/// characters and the message delimiter so that `<nick><delim><text>` lines
/// stay unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nickname(String);

impl Nickname {
    pub fn parse(raw: &str, max_len: usize) -> Result<Self, NicknameError> {
        if raw.is_empty() {
            return Err(NicknameError::Empty);
        }
        if raw.chars().count() > max_len {
            return Err(NicknameError::TooLong { max: max_len });
        }
        if let Some(c) = raw
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || *c == protocol::MSG_DELIMITER)
        {
            return Err(NicknameError::InvalidChar(c));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One joined client, owned by the registry.
#[derive(Debug, Clone)]
pub struct User {
    pub connection: ConnectionId,
    pub nickname: Nickname,
    pub address: SocketAddr,
    pub outbound: PusherChannel,
    /// Chat lines this user sent that were fanned out.
    pub sent_count: u64,
    /// Chat lines from other users delivered to this user.
    pub received_count: u64,
}

impl User {
    pub fn new(
        connection: ConnectionId,
        nickname: Nickname,
        address: SocketAddr,
        outbound: PusherChannel,
    ) -> Self {
        Self {
            connection,
            nickname,
            address,
            outbound,
            sent_count: 0,
            received_count: 0,
        }
    }

    pub fn member_info(&self) -> MemberInfo {
        MemberInfo {
            nickname: self.nickname.clone(),
            address: self.address,
        }
    }

    pub fn stats(&self) -> UserStats {
        UserStats {
            sent: self.sent_count,
            received: self.received_count,
        }
    }
}

/// Who produced a [`PendingMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    User,
    Server,
}

/// A chat line waiting in the broadcast queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub sender: String,
    pub text: String,
    pub origin: MessageOrigin,
}

impl PendingMessage {
    pub fn from_user(sender: &Nickname, text: impl Into<String>) -> Self {
        Self {
            sender: sender.as_str().to_string(),
            text: text.into(),
            origin: MessageOrigin::User,
        }
    }

    pub fn from_server(server_nickname: &str, text: impl Into<String>) -> Self {
        Self {
            sender: server_nickname.to_string(),
            text: text.into(),
            origin: MessageOrigin::Server,
        }
    }

    pub fn is_from_server(&self) -> bool {
        self.origin == MessageOrigin::Server
    }

    /// Wire form delivered to recipients: `<sender><delim><text>`.
    pub fn to_line(&self) -> String {
        protocol::format_line(&self.sender, &self.text)
    }
}

/// Roster entry returned by [`UserRegistry::list_members`](super::UserRegistry::list_members).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub nickname: Nickname,
    pub address: SocketAddr,
}

/// Usage counters of one member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub sent: u64,
    pub received: u64,
}
