//! Core package identity type.
//!
//! The [`PackageIdentifier`] struct names one release of the model pack on
//! the release host. It is built once per install run and never mutated.

use std::fmt;

use super::naming::DEFAULT_ASSET_PREFIX;

/// Sentinel tag name meaning "whatever release is current".
pub const LATEST_TAG: &str = "latest";

/// Which release of a repository to install.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReleaseTag {
    /// The most recent published release.
    #[default]
    Latest,
    /// A specific release tag, e.g. `v1.2.0`.
    Named(String),
}

impl ReleaseTag {
    /// Parse a tag from user input.
    ///
    /// Empty input and `latest` (any case) map to [`ReleaseTag::Latest`].
    ///
    /// # Example
    ///
    /// ```
    /// use modelpack::package::ReleaseTag;
    ///
    /// assert_eq!(ReleaseTag::parse("latest"), ReleaseTag::Latest);
    /// assert_eq!(ReleaseTag::parse(""), ReleaseTag::Latest);
    /// assert_eq!(ReleaseTag::parse("v2"), ReleaseTag::Named("v2".to_string()));
    /// ```
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(LATEST_TAG) {
            Self::Latest
        } else {
            Self::Named(trimmed.to_string())
        }
    }

    /// Check if this is the latest-release sentinel.
    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "{}", LATEST_TAG),
            Self::Named(tag) => write!(f, "{}", tag),
        }
    }
}

/// Coordinates of the release to install.
///
/// # Example
///
/// ```
/// use modelpack::package::{PackageIdentifier, ReleaseTag};
///
/// let id = PackageIdentifier::new("acme/brush-models").with_tag(ReleaseTag::parse("v3"));
///
/// assert_eq!(id.repository, "acme/brush-models");
/// assert_eq!(id.asset_prefix, "model-pack.7z.");
/// assert_eq!(id.to_string(), "acme/brush-models@v3");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct PackageIdentifier {
    /// Repository in `owner/name` form.
    pub repository: String,

    /// Release to install.
    pub tag: ReleaseTag,

    /// Token passed through to the release host as a bearer credential.
    pub access_token: Option<String>,

    /// Asset name prefix; part names are this prefix followed by digits.
    pub asset_prefix: String,
}

impl PackageIdentifier {
    /// Create an identifier for the latest release with the default prefix.
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into().trim().trim_matches('/').to_string(),
            tag: ReleaseTag::Latest,
            access_token: None,
            asset_prefix: DEFAULT_ASSET_PREFIX.to_string(),
        }
    }

    /// Set the release tag.
    pub fn with_tag(mut self, tag: ReleaseTag) -> Self {
        self.tag = tag;
        self
    }

    /// Set the access token. Blank tokens are ignored.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Set the asset name prefix.
    pub fn with_asset_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.asset_prefix = prefix.into();
        self
    }

    /// Check that the repository looks like `owner/name`.
    pub fn is_valid_repository(&self) -> bool {
        let mut segments = self.repository.split('/');
        matches!(
            (segments.next(), segments.next(), segments.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        )
    }
}

// Hand-written so the token never reaches logs.
impl fmt::Debug for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageIdentifier")
            .field("repository", &self.repository)
            .field("tag", &self.tag)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("asset_prefix", &self.asset_prefix)
            .finish()
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repository, self.tag)
    }
}
