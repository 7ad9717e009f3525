//! Disk space and writability checks run before a download starts.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{ManagerError, ManagerResult};

/// Name of the temporary file used to probe writability.
const PROBE_FILE: &str = ".modelpack-write-probe";

/// Free bytes available to unprivileged users on the filesystem holding `path`.
///
/// `path` need not exist yet; its nearest existing ancestor is queried.
/// Returns `None` on platforms without `statvfs`.
#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
pub fn available_space(path: &Path) -> ManagerResult<Option<u64>> {
    let probe = nearest_existing(path);
    let stat = nix::sys::statvfs::statvfs(probe.as_path())
        .map_err(|errno| ManagerError::io(&probe, io::Error::from(errno)))?;

    Ok(Some(
        (stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64),
    ))
}

#[cfg(not(unix))]
pub fn available_space(_path: &Path) -> ManagerResult<Option<u64>> {
    Ok(None)
}

/// Fail with `InsufficientSpace` when `path` cannot hold `required + headroom` bytes.
pub fn ensure_free_space(path: &Path, required: u64, headroom: u64) -> ManagerResult<()> {
    let Some(available) = available_space(path)? else {
        debug!(path = %path.display(), "free space unknown, skipping check");
        return Ok(());
    };

    let needed = required.saturating_add(headroom);
    debug!(path = %path.display(), needed, available, "free space check");

    if needed > available {
        return Err(ManagerError::InsufficientSpace {
            path: path.to_path_buf(),
            required: needed,
            available,
        });
    }
    Ok(())
}

/// Create `dir` if needed and check that files can be written into it.
pub async fn probe_writable(dir: &Path) -> ManagerResult<()> {
    let not_writable = |e: io::Error| {
        ManagerError::InvalidConfig(format!("{} is not writable: {}", dir.display(), e))
    };

    tokio::fs::create_dir_all(dir).await.map_err(not_writable)?;

    let probe = dir.join(PROBE_FILE);
    tokio::fs::write(&probe, b"probe")
        .await
        .map_err(not_writable)?;
    tokio::fs::remove_file(&probe).await.map_err(not_writable)?;
    Ok(())
}

fn nearest_existing(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn test_available_space_of_missing_child() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("a/b/c");

        let space = available_space(&missing).unwrap();
        assert!(space.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_available_space_is_reported_for_temp_dir() {
        let temp = TempDir::new().unwrap();
        let space = available_space(temp.path()).unwrap();
        assert!(matches!(space, Some(bytes) if bytes > 0));
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_free_space_shortfall() {
        let temp = TempDir::new().unwrap();

        match ensure_free_space(temp.path(), u64::MAX / 2, 0) {
            Err(ManagerError::InsufficientSpace {
                required,
                available,
                ..
            }) => {
                assert_eq!(required, u64::MAX / 2);
                assert!(available < required);
            }
            other => panic!("expected InsufficientSpace, got {:?}", other),
        }
    }

    #[test]
    fn test_ensure_free_space_small_request() {
        let temp = TempDir::new().unwrap();
        assert!(ensure_free_space(temp.path(), 1, 0).is_ok());
    }

    #[test]
    fn test_nearest_existing() {
        let temp = TempDir::new().unwrap();
        assert_eq!(nearest_existing(&temp.path().join("x/y")), temp.path());
    }

    #[tokio::test]
    async fn test_probe_writable_creates_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("new/output");

        probe_writable(&dir).await.unwrap();

        assert!(dir.is_dir());
        assert!(!dir.join(PROBE_FILE).exists());
    }

    #[tokio::test]
    async fn test_probe_writable_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        let err = probe_writable(&file).await.unwrap_err();
        assert!(matches!(err, ManagerError::InvalidConfig(_)));
    }
}
