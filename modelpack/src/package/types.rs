//! Downloadable archive part type.

use std::cmp::Ordering;

use super::naming::{compare_part_names, parse_part_number};

/// One volume of a split archive as published on the release host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPart {
    /// Asset file name, e.g. `model-pack.7z.001`.
    pub name: String,

    /// URL the bytes are fetched from.
    pub source_url: String,

    /// Size in bytes; 0 means unknown.
    pub expected_size: u64,

    /// Lowercase hex SHA-256 digest, when the listing publishes one.
    pub sha256: Option<String>,
}

impl AssetPart {
    /// Create a part with unknown size and no digest.
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
            expected_size: 0,
            sha256: None,
        }
    }

    /// Set the expected size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.expected_size = size;
        self
    }

    /// Set the expected SHA-256 digest.
    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into().to_ascii_lowercase());
        self
    }

    /// Expected size, if known.
    pub fn known_size(&self) -> Option<u64> {
        (self.expected_size > 0).then_some(self.expected_size)
    }

    /// Numeric suffix of the part name for the given prefix.
    pub fn number(&self, prefix: &str) -> Option<u32> {
        parse_part_number(prefix, &self.name)
    }
}

/// Sort parts in place by their numeric suffix.
pub fn sort_parts(prefix: &str, parts: &mut [AssetPart]) {
    parts.sort_by(|a, b| compare_parts(prefix, a, b));
}

fn compare_parts(prefix: &str, a: &AssetPart, b: &AssetPart) -> Ordering {
    compare_part_names(prefix, &a.name, &b.name)
}
