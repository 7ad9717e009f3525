//! Resilient package installer.
//!
//! Installs a multi-part archive published as release assets:
//!
//! ```text
//! PackageIdentifier
//!     │
//!     ├── AssetResolver        (release listing, then direct probing)
//!     ├── TransferOrchestrator (sequential parts)
//!     │       └── PartDownloader (resume, retry, verify)
//!     │               └── Transport (redirects, ranges)
//!     ├── ArchiveExtractor     (external 7-Zip compatible binary)
//!     └── Installer            (phases, events, terminal result)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use modelpack::manager::{Installer, ManagerConfig};
//! use modelpack::package::PackageIdentifier;
//!
//! let installer = Installer::new(ManagerConfig::default())?;
//! let id = PackageIdentifier::new("acme/models");
//! let result = installer.install(&id, Path::new("/opt/models")).await;
//! ```

mod config;
mod context;
pub mod download;
mod error;
mod events;
mod extractor;
mod installer;
mod resolver;
mod space;
mod transport;

#[cfg(test)]
mod testing;

pub use config::{
    ManagerConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, DEFAULT_SPACE_HEADROOM,
    DEFAULT_TIMEOUT_SECS,
};
pub use context::RunContext;
pub use error::{ManagerError, ManagerResult};
pub use events::{
    ChannelObserver, EventLog, InstallEvent, InstallObserver, InstallPhase, LogEvent, LogLevel,
    ProgressEvent,
};
pub use extractor::{
    count_files_recursive, ArchiveExtractor, ExternalArchiver, ExtractSummary,
    DEFAULT_ARCHIVER_CANDIDATES,
};
pub use installer::{InstallResult, Installer};
pub use resolver::{
    AssetResolver, DEFAULT_API_BASE, DEFAULT_DOWNLOAD_BASE, DEFAULT_MAX_PROBE_PARTS,
};
pub use space::{available_space, ensure_free_space, probe_writable};
pub use transport::{
    parse_content_range, BodyStream, BoxFuture, ContentRange, HttpMethod, HttpRequest,
    HttpResponse, HttpSend, ReqwestSend, Transport, DEFAULT_MAX_REDIRECTS, USER_AGENT,
};
