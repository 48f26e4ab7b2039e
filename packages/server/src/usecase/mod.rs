//! Use cases: the per-connection session protocol and the broadcast dispatcher.

mod dispatcher;
mod error;
mod session;

pub use dispatcher::BroadcastDispatcher;
pub use error::JoinRejection;
pub use session::{ChatSession, SessionContext, SessionOutcome, SessionReport};
