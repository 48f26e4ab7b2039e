//! In-memory user registry.
//!
//! Members live in a `Vec` behind one `tokio::sync::Mutex`, kept in join
//! order. Every operation, the dispatcher's fan-out included, runs under that
//! single lock. A recipient whose outbound channel is full therefore stalls
//! joins, leaves, `#list` and `#stats` for everybody until the fan-out moves
//! on. Outbound channels are bounded per connection, so this only happens when
//! a peer stops reading for long enough to fill its buffer.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{
        ConnectionId, FanOutReport, MemberInfo, Nickname, PendingMessage, PusherChannel,
        RegistryError, User, UserRegistry, UserStats, protocol,
    },
    infrastructure::MessageQueue,
};

/// Registry of joined users backed by a vector.
pub struct InMemoryUserRegistry {
    members: Mutex<Vec<User>>,
    capacity: usize,
    server_nickname: String,
    /// Where join/leave announcements go
    queue: MessageQueue,
}

impl InMemoryUserRegistry {
    pub fn new(capacity: usize, server_nickname: impl Into<String>, queue: MessageQueue) -> Self {
        Self {
            members: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            server_nickname: server_nickname.into(),
            queue,
        }
    }
}

#[async_trait]
impl UserRegistry for InMemoryUserRegistry {
    async fn join(
        &self,
        connection: ConnectionId,
        nickname: Nickname,
        address: SocketAddr,
        outbound: PusherChannel,
    ) -> Result<(), RegistryError> {
        // Reserve the announcement slot before locking: the dispatcher needs
        // this lock to drain the queue.
        let slot = self.queue.reserve().await?;

        let mut members = self.members.lock().await;
        if members.len() >= self.capacity {
            return Err(RegistryError::TooManyUsers { max: self.capacity });
        }
        if nickname.as_str() == self.server_nickname
            || members.iter().any(|m| m.nickname == nickname)
        {
            return Err(RegistryError::NicknameTaken(nickname.as_str().to_string()));
        }
        if members.iter().any(|m| m.connection == connection) {
            return Err(RegistryError::AlreadyJoined(connection));
        }

        let announcement = protocol::joined_text(nickname.as_str());
        tracing::info!("{} ({}, connection {})", announcement, address, connection);
        members.push(User::new(connection, nickname, address, outbound));
        slot.commit(PendingMessage::from_server(&self.server_nickname, announcement));

        Ok(())
    }

    async fn leave(&self, connection: ConnectionId) -> Result<(), RegistryError> {
        let slot = self.queue.reserve().await?;

        let mut members = self.members.lock().await;
        let index = members
            .iter()
            .position(|m| m.connection == connection)
            .ok_or(RegistryError::UserNotFound(connection))?;
        // Vec::remove keeps the relative order of the remaining members
        let user = members.remove(index);

        let announcement = protocol::left_text(user.nickname.as_str());
        tracing::info!("{} (connection {})", announcement, connection);
        slot.commit(PendingMessage::from_server(&self.server_nickname, announcement));

        Ok(())
    }

    async fn list_members(&self) -> Vec<MemberInfo> {
        let members = self.members.lock().await;
        members.iter().map(User::member_info).collect()
    }

    async fn stats(&self, connection: ConnectionId) -> Result<UserStats, RegistryError> {
        let members = self.members.lock().await;
        members
            .iter()
            .find(|m| m.connection == connection)
            .map(User::stats)
            .ok_or(RegistryError::UserNotFound(connection))
    }

    async fn fan_out(&self, message: &PendingMessage) -> FanOutReport {
        let line = message.to_line();
        let counted = !message.is_from_server();
        let mut report = FanOutReport::default();

        let mut members = self.members.lock().await;
        for member in members.iter_mut() {
            if member.nickname.as_str() == message.sender {
                if counted {
                    member.sent_count += 1;
                }
                continue;
            }
            match member.outbound.send(line.clone()).await {
                Ok(()) => {
                    report.delivered += 1;
                    if counted {
                        member.received_count += 1;
                    }
                }
                Err(_) => {
                    // The member's session notices its broken connection on its own
                    report.failed += 1;
                    tracing::warn!(
                        "Failed to deliver message from '{}' to '{}' (connection {})",
                        message.sender,
                        member.nickname,
                        member.connection
                    );
                }
            }
        }

        report
    }

    async fn count(&self) -> usize {
        self.members.lock().await.len()
    }
}
