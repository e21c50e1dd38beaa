#![deny(warnings)]

// Library crate for confined-fileio-mcp

pub mod config;
pub mod dispatch;
pub mod error;
pub mod operations;
pub mod server;
pub mod tools;
pub mod transport;
