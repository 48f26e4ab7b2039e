//! Shared utilities for the Salotto chat workspace.

pub mod logger;
