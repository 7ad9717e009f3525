//! SHA-256 checksum calculation for staged part verification.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::manager::error::{ManagerError, ManagerResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Length of a hex-encoded SHA-256 digest.
const SHA256_HEX_LEN: usize = 64;

/// Calculate SHA-256 checksum of a file.
///
/// Returns the lowercase hexadecimal hash of the file contents.
pub fn calculate_file_checksum(path: &Path) -> ManagerResult<String> {
    let mut file = File::open(path).map_err(|e| ManagerError::io(path, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ManagerError::io(path, e))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify that a file matches an expected checksum.
///
/// `part` names the file in the resulting error.
pub fn verify_checksum(path: &Path, part: &str, expected: &str) -> ManagerResult<()> {
    let actual = calculate_file_checksum(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(ManagerError::ChecksumMismatch {
            part: part.to_string(),
            expected: expected.to_ascii_lowercase(),
            actual,
        });
    }
    Ok(())
}

/// Hash a file on the blocking pool.
pub async fn verify_checksum_async(
    path: PathBuf,
    part: String,
    expected: String,
) -> ManagerResult<()> {
    let display_path = path.clone();
    tokio::task::spawn_blocking(move || verify_checksum(&path, &part, &expected))
        .await
        .map_err(|e| {
            ManagerError::io(
                display_path,
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            )
        })?
}

/// Extract the hex digest from a release asset `digest` field.
///
/// Accepts `sha256:<hex>`; other algorithms and malformed values yield `None`.
pub fn parse_sha256_digest(value: &str) -> Option<String> {
    let (algorithm, hex) = value.trim().split_once(':')?;
    if !algorithm.eq_ignore_ascii_case("sha256") {
        return None;
    }
    if hex.len() != SHA256_HEX_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(hex.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_calculate_file_checksum() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("test.txt");

        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"hello world").unwrap();

        let checksum = calculate_file_checksum(&file_path).unwrap();
        assert_eq!(checksum, HELLO_WORLD_SHA256);
    }

    #[test]
    fn test_calculate_empty_file() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("empty.txt");

        File::create(&file_path).unwrap();

        let checksum = calculate_file_checksum(&file_path).unwrap();
        assert_eq!(
            checksum,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_calculate_nonexistent_file() {
        let result = calculate_file_checksum(Path::new("/nonexistent/file.txt"));
        assert!(matches!(result, Err(ManagerError::Io { .. })));
    }

    #[test]
    fn test_verify_checksum_match_ignores_case() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("test.txt");
        std::fs::write(&file_path, b"hello world").unwrap();

        let upper = HELLO_WORLD_SHA256.to_ascii_uppercase();
        assert!(verify_checksum(&file_path, "test.txt", &upper).is_ok());
    }

    #[test]
    fn test_verify_checksum_mismatch() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("test.txt");
        std::fs::write(&file_path, b"hello world").unwrap();

        match verify_checksum(&file_path, "model-pack.7z.001", "wrong_checksum") {
            Err(ManagerError::ChecksumMismatch { part, actual, .. }) => {
                assert_eq!(part, "model-pack.7z.001");
                assert_eq!(actual, HELLO_WORLD_SHA256);
            }
            other => panic!("Expected ChecksumMismatch error, got {:?}", other),
        }
    }

    #[test]
    fn test_large_file_checksum() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("large.bin");

        // Larger than the read buffer
        std::fs::write(&file_path, vec![0xABu8; 100_000]).unwrap();

        let checksum = calculate_file_checksum(&file_path).unwrap();
        let checksum2 = calculate_file_checksum(&file_path).unwrap();
        assert_eq!(checksum, checksum2);
        assert_eq!(checksum.len(), SHA256_HEX_LEN);
    }

    #[tokio::test]
    async fn test_verify_checksum_async() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("a.bin");
        std::fs::write(&file_path, b"hello world").unwrap();

        let result = verify_checksum_async(
            file_path,
            "a.bin".to_string(),
            HELLO_WORLD_SHA256.to_string(),
        )
        .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_sha256_digest() {
        let digest = format!("sha256:{}", HELLO_WORLD_SHA256.to_ascii_uppercase());
        assert_eq!(
            parse_sha256_digest(&digest).as_deref(),
            Some(HELLO_WORLD_SHA256)
        );
        assert_eq!(parse_sha256_digest("md5:abcdef"), None);
        assert_eq!(parse_sha256_digest("sha256:abc"), None);
        assert_eq!(parse_sha256_digest(HELLO_WORLD_SHA256), None);
    }
}
