//! User registry trait.
//!
//! The registry is the only shared directory of joined users. Every method
//! runs inside one process-wide exclusive section, so a snapshot never
//! observes a half-applied join or leave, and a join/leave is observed
//! together with the announcement it enqueues.

use std::net::SocketAddr;

use async_trait::async_trait;

use super::{
    ConnectionId, MemberInfo, Nickname, PendingMessage, PusherChannel, RegistryError, UserStats,
};

/// Outcome of fanning one message out to the members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Members whose outbound channel accepted the line.
    pub delivered: usize,
    /// Members whose outbound channel was already closed.
    pub failed: usize,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRegistry: Send + Sync {
    /// Register a new member and announce it to everyone, the new member included.
    ///
    /// Fails with [`RegistryError::TooManyUsers`] when full and with
    /// [`RegistryError::NicknameTaken`] on an exact, case-sensitive nickname match.
    async fn join(
        &self,
        connection: ConnectionId,
        nickname: Nickname,
        address: SocketAddr,
        outbound: PusherChannel,
    ) -> Result<(), RegistryError>;

    /// Remove the member owning `connection` and announce its departure.
    async fn leave(&self, connection: ConnectionId) -> Result<(), RegistryError>;

    /// Members in join order.
    async fn list_members(&self) -> Vec<MemberInfo>;

    /// Counters of the member owning `connection`.
    async fn stats(&self, connection: ConnectionId) -> Result<UserStats, RegistryError>;

    /// Deliver `message` to every member except its sender and update counters.
    async fn fan_out(&self, message: &PendingMessage) -> FanOutReport;

    /// Number of current members.
    async fn count(&self) -> usize;
}
