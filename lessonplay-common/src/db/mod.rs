//! Database support for the durable media store

pub mod init;

pub use init::{init_database, init_memory_database};
