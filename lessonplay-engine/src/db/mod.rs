//! Database access layer
//!
//! Provides the durable key-value store behind pinned media.

pub mod media_store;
