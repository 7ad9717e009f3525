//! Installed package type with filesystem context.
//!
//! The [`InstalledPackage`] struct is the success payload of an install run.
//! It wraps the [`PackageIdentifier`] it was installed from using composition.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use super::core::PackageIdentifier;

/// A model pack that was downloaded and extracted.
///
/// # Composition Pattern
///
/// `InstalledPackage` contains the originating identifier rather than
/// duplicating its fields. The [`Deref`] implementation gives transparent
/// access to them.
///
/// # Example
///
/// ```
/// use modelpack::package::{InstalledPackage, PackageIdentifier};
///
/// let id = PackageIdentifier::new("acme/models");
/// let installed = InstalledPackage::new(Some(id), "/opt/models");
///
/// assert_eq!(installed.install_dir.to_str().unwrap(), "/opt/models");
/// assert_eq!(installed.source().unwrap().repository, "acme/models");
/// ```
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    /// Identifier the package came from; `None` for local installs.
    pub identifier: Option<PackageIdentifier>,

    /// Directory holding the extracted tree.
    pub install_dir: PathBuf,

    /// Names of the parts that were assembled, in order.
    pub parts: Vec<String>,

    /// Bytes transferred over the network during this run.
    ///
    /// Parts that were already complete on disk do not count.
    pub bytes_downloaded: u64,

    /// Number of regular files found in the install directory.
    pub files_extracted: usize,
}

impl InstalledPackage {
    /// Create an installed package with no transfer statistics.
    pub fn new(identifier: Option<PackageIdentifier>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            identifier,
            install_dir: install_dir.into(),
            parts: Vec::new(),
            bytes_downloaded: 0,
            files_extracted: 0,
        }
    }

    /// Record the assembled part names.
    pub fn with_parts(mut self, parts: Vec<String>) -> Self {
        self.parts = parts;
        self
    }

    /// Record the network byte count.
    pub fn with_bytes_downloaded(mut self, bytes: u64) -> Self {
        self.bytes_downloaded = bytes;
        self
    }

    /// Record the extracted file count.
    pub fn with_files_extracted(mut self, count: usize) -> Self {
        self.files_extracted = count;
        self
    }

    /// The identifier this package was installed from, if any.
    pub fn source(&self) -> Option<&PackageIdentifier> {
        self.identifier.as_ref()
    }

    /// Directory holding the extracted tree.
    pub fn path(&self) -> &Path {
        &self.install_dir
    }
}

impl Deref for InstalledPackage {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.install_dir
    }
}
