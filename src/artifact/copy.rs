//! Filesystem helpers for placing artifacts

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

use super::{InstallError, InstallResult};

/// Remove whatever is at `path`; a missing path is not an error
///
/// Returns true when something was removed.
pub fn remove_existing(path: &Path) -> io::Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

/// Create a symbolic link at `link` pointing to `target`
pub fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(not(unix))]
    {
        let _ = (target, link);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symbolic links are only supported on unix",
        ))
    }
}

/// Copy a single file, creating parent directories
pub fn copy_file(source: &Path, destination: &Path) -> InstallResult<()> {
    tracing::info!("copying {} to {}", source.display(), destination.display());

    let copy_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| InstallError::Copy { path, source }
    };

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(copy_err(parent))?;
    }
    fs::copy(source, destination).map_err(copy_err(source))?;
    Ok(())
}

/// Copy a directory bundle; symlinks inside the bundle are recreated as links
///
/// Returns the number of files and links copied.
pub fn copy_bundle(source: &Path, destination: &Path) -> InstallResult<usize> {
    tracing::info!("copying {} to {}", source.display(), destination.display());

    let mut copied = 0;
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| InstallError::Copy {
            path: e.path().unwrap_or(source).to_path_buf(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed")),
        })?;

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| InstallError::Copy {
                path: entry.path().to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "path outside bundle"),
            })?;
        let target = destination.join(relative);
        let io_err = |source| InstallError::Copy {
            path: target.clone(),
            source,
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(io_err)?;
        } else if file_type.is_symlink() {
            let link_target = fs::read_link(entry.path()).map_err(io_err)?;
            make_symlink(&link_target, &target).map_err(io_err)?;
            copied += 1;
        } else {
            fs::copy(entry.path(), &target).map_err(io_err)?;
            copied += 1;
        }
    }

    Ok(copied)
}
