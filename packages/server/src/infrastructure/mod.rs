//! Infrastructure layer: concrete registry, broadcast queue and line transport.

pub mod codec;
pub mod queue;
pub mod registry;

pub use codec::ChatLineCodec;
pub use queue::{MessageQueue, QueueConsumer, QueueSlot};
pub use registry::InMemoryUserRegistry;
