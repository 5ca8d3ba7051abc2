//! MCP stdio server for the Victualia REST API.

pub mod cli;
pub mod registry;
pub mod server;
