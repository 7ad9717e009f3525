//! modelpack - resilient installer for split-archive model packages
//!
//! A model pack is published as numbered archive volumes
//! (`model-pack.7z.001`, `.002`, ...) attached to a release. This library
//! discovers the volumes, downloads them one at a time with resume and
//! retry, hands the first volume to an external archiver, and verifies the
//! extracted tree.
//!
//! - [`package`]: package identity and part naming
//! - [`manager`]: resolver, transport, downloader, extractor and the installer facade
//! - [`config`]: INI configuration file
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod logging;
pub mod manager;
pub mod package;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
