//! Archive extraction for package installation.
//!
//! Extraction is delegated to an external multi-volume archiver. It is
//! pointed at the first part and picks up sibling volumes on its own.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use super::error::{ManagerError, ManagerResult};
use super::transport::BoxFuture;

/// Archiver binaries tried on `PATH`, in order.
pub const DEFAULT_ARCHIVER_CANDIDATES: [&str; 3] = ["7z", "7za", "7zz"];

/// Longest diagnostic output kept from a failed archiver run.
const MAX_DIAGNOSTIC_LEN: usize = 4096;

/// What an extraction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub output_dir: PathBuf,
    /// Regular files found under `output_dir` after extraction.
    pub files_extracted: usize,
}

/// Extracts a split archive into a directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract the archive starting at `first_part` into `output_dir`.
    ///
    /// The output directory is created when absent and existing files are
    /// overwritten.
    fn extract<'a>(
        &'a self,
        first_part: &'a Path,
        output_dir: &'a Path,
    ) -> BoxFuture<'a, ManagerResult<ExtractSummary>>;
}

/// Runs an external 7-Zip compatible archiver.
///
/// Invoked as `<program> [leading args] x -y -aoa -o<output_dir> <first_part>`.
#[derive(Debug, Clone, Default)]
pub struct ExternalArchiver {
    program: Option<PathBuf>,
    leading_args: Vec<String>,
}

impl ExternalArchiver {
    /// Archiver located on `PATH` at extraction time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific archiver binary (a path or a name on `PATH`).
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Arguments placed before the extraction arguments.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve the archiver binary.
    pub fn locate(&self) -> ManagerResult<PathBuf> {
        match &self.program {
            Some(program) if program.components().count() > 1 => {
                if program.is_file() {
                    Ok(program.clone())
                } else {
                    Err(ManagerError::ArchiverNotFound {
                        tried: program.display().to_string(),
                    })
                }
            }
            Some(program) => {
                which::which(program).map_err(|_| ManagerError::ArchiverNotFound {
                    tried: program.display().to_string(),
                })
            }
            None => DEFAULT_ARCHIVER_CANDIDATES
                .iter()
                .find_map(|candidate| which::which(candidate).ok())
                .ok_or_else(|| ManagerError::ArchiverNotFound {
                    tried: DEFAULT_ARCHIVER_CANDIDATES.join(", "),
                }),
        }
    }

    async fn run(&self, first_part: &Path, output_dir: &Path) -> ManagerResult<ExtractSummary> {
        if !first_part.is_file() {
            return Err(ManagerError::io(
                first_part,
                io::Error::new(io::ErrorKind::NotFound, "first archive part not found"),
            ));
        }

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| ManagerError::io(output_dir, e))?;

        let program = self.locate()?;
        info!(
            archiver = %program.display(),
            archive = %first_part.display(),
            output = %output_dir.display(),
            "extracting"
        );

        let mut output_arg = std::ffi::OsString::from("-o");
        output_arg.push(output_dir.as_os_str());

        let output = Command::new(&program)
            .args(&self.leading_args)
            .args(["x", "-y", "-aoa"])
            .arg(output_arg)
            .arg(first_part)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    ManagerError::ArchiverNotFound {
                        tried: program.display().to_string(),
                    }
                } else {
                    ManagerError::io(&program, e)
                }
            })?;

        if !output.status.success() {
            return Err(ManagerError::ExtractionFailed {
                exit_code: output.status.code(),
                diagnostic_output: diagnostic(&output.stderr, &output.stdout),
            });
        }

        let dir = output_dir.to_path_buf();
        let files_extracted = tokio::task::spawn_blocking(move || count_files_recursive(&dir))
            .await
            .map_err(|e| {
                ManagerError::io(output_dir, io::Error::new(io::ErrorKind::Other, e.to_string()))
            })??;

        debug!(files = files_extracted, "extraction finished");
        Ok(ExtractSummary {
            output_dir: output_dir.to_path_buf(),
            files_extracted,
        })
    }
}

impl ArchiveExtractor for ExternalArchiver {
    fn extract<'a>(
        &'a self,
        first_part: &'a Path,
        output_dir: &'a Path,
    ) -> BoxFuture<'a, ManagerResult<ExtractSummary>> {
        Box::pin(self.run(first_part, output_dir))
    }
}

/// Prefer stderr; fall back to the tail of stdout.
fn diagnostic(stderr: &[u8], stdout: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(stdout)
    } else {
        stderr
    };
    let text = text.trim();

    if text.len() <= MAX_DIAGNOSTIC_LEN {
        return text.to_string();
    }
    let mut start = text.len() - MAX_DIAGNOSTIC_LEN;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// Count files recursively in a directory.
pub fn count_files_recursive(dir: &Path) -> ManagerResult<usize> {
    let mut count = 0;

    if !dir.exists() {
        return Ok(0);
    }

    let entries = fs::read_dir(dir).map_err(|e| ManagerError::io(dir, e))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            count += 1;
        } else if path.is_dir() {
            count += count_files_recursive(&path)?;
        }
    }

    Ok(count)
}
