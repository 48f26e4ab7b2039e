//! Server state shared by all connection tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{domain::ConnectionId, usecase::SessionContext};

/// Shared application state
pub struct AppState {
    /// Collaborators handed to every session
    pub session_context: SessionContext,
    /// Longest line accepted from or written to a client
    pub max_line_len: usize,
    /// Capacity of each connection's outbound channel
    pub outbound_buffer: usize,
    next_connection: AtomicU64,
}

impl AppState {
    pub fn new(session_context: SessionContext, max_line_len: usize, outbound_buffer: usize) -> Self {
        Self {
            session_context,
            max_line_len,
            outbound_buffer,
            next_connection: AtomicU64::new(1),
        }
    }

    /// Hand out a fresh connection handle.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection.fetch_add(1, Ordering::Relaxed))
    }
}
