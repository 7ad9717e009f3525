//! CLI command implementations.

pub mod common;
pub mod config;
pub mod extract;
pub mod install;
pub mod resolve;
