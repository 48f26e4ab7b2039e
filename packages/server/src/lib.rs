//! Line-based multi-user TCP chat server.
//!
//! Clients join with `#join <nickname>`, then every chat line they send is
//! queued and broadcast to all other members by a single dispatcher task.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
