//! Centralized split-archive naming conventions.
//!
//! This module is the single source of truth for model pack part naming:
//! - Part filenames (e.g., `model-pack.7z.001`)
//! - Part numbers parsed back out of filenames
//! - Staging filenames for in-progress downloads (e.g., `model-pack.7z.001.partial`)
//!
//! All other modules should use these functions rather than constructing names directly.
//! This keeps the resolver, downloader and cleanup code in agreement.

use std::cmp::Ordering;

/// Default asset name prefix for model pack volumes.
pub const DEFAULT_ASSET_PREFIX: &str = "model-pack.7z.";

/// Width of the zero-padded numeric suffix on part names.
pub const PART_NUMBER_WIDTH: usize = 3;

/// Suffix appended to a part name while it is still being downloaded.
pub const STAGING_SUFFIX: &str = ".partial";

/// Generate the filename of a numbered archive part.
///
/// # Format
///
/// `{prefix}{number:03}`
///
/// # Examples
///
/// ```
/// use modelpack::package::part_filename;
///
/// assert_eq!(part_filename("model-pack.7z.", 1), "model-pack.7z.001");
/// assert_eq!(part_filename("model-pack.7z.", 42), "model-pack.7z.042");
/// assert_eq!(part_filename("model-pack.7z.", 1234), "model-pack.7z.1234");
/// ```
pub fn part_filename(prefix: &str, number: u32) -> String {
    format!("{}{:0width$}", prefix, number, width = PART_NUMBER_WIDTH)
}

/// Parse the part number out of a part filename.
///
/// Returns `None` unless the name is exactly `prefix` followed by one or
/// more ASCII digits.
///
/// # Examples
///
/// ```
/// use modelpack::package::parse_part_number;
///
/// assert_eq!(parse_part_number("model-pack.7z.", "model-pack.7z.001"), Some(1));
/// assert_eq!(parse_part_number("model-pack.7z.", "model-pack.7z.10"), Some(10));
/// assert_eq!(parse_part_number("model-pack.7z.", "model-pack.7z.001.sha256"), None);
/// assert_eq!(parse_part_number("model-pack.7z.", "other.7z.001"), None);
/// ```
pub fn parse_part_number(prefix: &str, name: &str) -> Option<u32> {
    let suffix = name.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Check whether a filename is a part of the given archive.
pub fn is_part_filename(prefix: &str, name: &str) -> bool {
    parse_part_number(prefix, name).is_some()
}

/// Generate the staging filename for a part that is still downloading.
///
/// # Examples
///
/// ```
/// use modelpack::package::staging_filename;
///
/// assert_eq!(staging_filename("model-pack.7z.001"), "model-pack.7z.001.partial");
/// ```
pub fn staging_filename(part_name: &str) -> String {
    format!("{}{}", part_name, STAGING_SUFFIX)
}

/// Compare two part names by their numeric suffix.
///
/// Names that do not parse as parts sort after every valid part, ordered
/// lexically among themselves so the comparison stays total.
pub fn compare_part_names(prefix: &str, a: &str, b: &str) -> Ordering {
    match (parse_part_number(prefix, a), parse_part_number(prefix, b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
