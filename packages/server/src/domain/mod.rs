//! Domain layer: value objects, entities, wire vocabulary and the registry seam.
//!
//! Nothing in here touches sockets. The infrastructure layer implements
//! [`UserRegistry`] and the use cases depend only on the trait.

mod error;
mod model;
pub mod protocol;
mod registry;

pub use error::{NicknameError, QueueError, RegistryError};
pub use model::{
    ConnectionId, MemberInfo, MessageOrigin, Nickname, PendingMessage, PusherChannel, User,
    UserStats,
};
pub use registry::{FanOutReport, UserRegistry};

#[cfg(test)]
pub use registry::MockUserRegistry;
