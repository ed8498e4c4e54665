//! Database initialization and connection pooling

pub mod init;

pub use init::*;
