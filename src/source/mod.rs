//! Source distribution retrieval and definition lookup.

mod locate;

pub use locate::{locate_definitions, LocateOptions};

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

use crate::registry::{normalize_package_name, PackageRef, PypiIndex, RegistryError};

/// Errors that can occur while retrieving a source distribution.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("no source archive for {0}")]
    NoArchive(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("extraction failed: {0}")]
    Extract(String),
}

/// Strategy that makes a module's source tree available on disk.
pub trait SourceProvider {
    /// Returns the root of the extracted source tree.
    fn retrieve(&self, package: &PackageRef) -> Result<PathBuf, SourceError>;
}

/// Retrieves sdists from the package index and extracts them under
/// `work_dir`.
pub struct SdistRetriever<'a> {
    index: &'a PypiIndex,
    work_dir: PathBuf,
}

impl<'a> SdistRetriever<'a> {
    pub fn new(index: &'a PypiIndex, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            index,
            work_dir: work_dir.into(),
        }
    }

    fn destination(&self, package: &PackageRef) -> PathBuf {
        self.work_dir.join(format!(
            "{}-{}",
            normalize_package_name(&package.name),
            package.version
        ))
    }
}

impl SourceProvider for SdistRetriever<'_> {
    fn retrieve(&self, package: &PackageRef) -> Result<PathBuf, SourceError> {
        let dest = self.destination(package);
        if is_populated(&dest) {
            log::debug!("reusing extracted sources at {}", dest.display());
            return Ok(source_root(&dest));
        }

        let url = self
            .index
            .sdist_link(package)?
            .ok_or_else(|| SourceError::NoArchive(package.to_string()))?;
        log::info!("downloading {}", url);

        fs::create_dir_all(&self.work_dir)?;
        // Removed on drop, whether extraction succeeds or not.
        let mut archive = tempfile::Builder::new()
            .prefix("sdist-")
            .suffix(".tar.gz")
            .tempfile_in(&self.work_dir)?;
        let bytes = self.index.download(url, archive.as_file_mut())?;
        log::debug!("downloaded {} bytes for {}", bytes, package);

        extract_archive(archive.path(), &dest)?;
        Ok(source_root(&dest))
    }
}

/// Extract a `.tar.gz` archive into `dest` with the system `tar`.
///
/// `dest` is removed again when extraction fails.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), SourceError> {
    fs::create_dir_all(dest)?;

    let output = Command::new("tar")
        .arg("-xzf")
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .output();

    let failure = match output {
        Ok(out) if out.status.success() => return Ok(()),
        Ok(out) => String::from_utf8_lossy(&out.stderr).trim().to_string(),
        Err(e) => format!("cannot run tar: {}", e),
    };

    if let Err(e) = fs::remove_dir_all(dest) {
        log::debug!("cannot remove {}: {}", dest.display(), e);
    }
    Err(SourceError::Extract(failure))
}

fn is_populated(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Sdists usually wrap everything in one `<name>-<version>/` directory.
fn source_root(dest: &Path) -> PathBuf {
    let Ok(entries) = fs::read_dir(dest) else {
        return dest.to_path_buf();
    };
    let entries: Vec<_> = entries.flatten().collect();
    match entries.as_slice() {
        [only] if only.path().is_dir() => only.path(),
        _ => dest.to_path_buf(),
    }
}
