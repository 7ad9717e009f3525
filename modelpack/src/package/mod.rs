//! Model pack identity, archive part and naming types.
//!
//! # Overview
//!
//! The model pack is published as a split 7z archive attached to a release:
//!
//! - **PackageIdentifier**: repository, release tag, optional token and asset prefix
//! - **AssetPart**: one downloadable volume (`model-pack.7z.001`, `.002`, ...)
//! - **InstalledPackage**: the extracted result of a successful run
//!
//! # Type Hierarchy
//!
//! ```text
//! PackageIdentifier (base)          InstalledPackage (composition)
//! ├── repository: String            ├── identifier: Option<PackageIdentifier>
//! ├── tag: ReleaseTag               ├── install_dir: PathBuf
//! ├── access_token: Option<String>  ├── parts: Vec<String>
//! └── asset_prefix: String          └── bytes_downloaded / files_extracted
//! ```
//!
//! Part ordering is always numeric by suffix; see [`compare_part_names`].

mod core;
mod installed;
mod naming;
mod types;

// Core types
pub use self::core::{PackageIdentifier, ReleaseTag, LATEST_TAG};
pub use installed::InstalledPackage;
pub use types::{sort_parts, AssetPart};

// Naming utilities
pub use naming::{
    compare_part_names, is_part_filename, parse_part_number, part_filename, staging_filename,
    DEFAULT_ASSET_PREFIX, PART_NUMBER_WIDTH, STAGING_SUFFIX,
};
