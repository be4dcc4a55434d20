//! Packaged archive extraction

use std::fs::{self, File};
use std::io;
use std::path::Path;

use bridge_layout::{classify_entry, BundleLayout, EntryDisposition, SkipReason};
use zip::ZipArchive;

use super::{InstallError, InstallResult};

/// Counters from one extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackSummary {
    pub files: usize,
    pub directories: usize,
    pub skipped: usize,
    /// Entries outside the expected subpath (extracted anyway)
    pub mismatched: Vec<String>,
}

/// Extract `archive_path` into `destination` following `layout`
pub fn unpack(
    archive_path: &Path,
    destination: &Path,
    layout: &BundleLayout,
) -> InstallResult<UnpackSummary> {
    tracing::info!(
        "unpacking {} to {} (expected subpath {})",
        archive_path.display(),
        destination.display(),
        layout.subpath
    );

    if !archive_path.is_file() {
        return Err(InstallError::ArchiveMissing(archive_path.to_path_buf()));
    }

    let file = File::open(archive_path).map_err(|e| InstallError::Extraction {
        entry: archive_path.display().to_string(),
        source: e,
    })?;
    let mut archive = ZipArchive::new(file).map_err(|e| InstallError::Extraction {
        entry: archive_path.display().to_string(),
        source: zip_to_io(e),
    })?;

    let mut summary = UnpackSummary::default();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| InstallError::Extraction {
            entry: format!("#{index}"),
            source: zip_to_io(e),
        })?;
        let name = entry.name().to_string();

        let (relative, is_dir, mismatched) = match classify_entry(&name, layout) {
            EntryDisposition::Skip(reason) => {
                if reason == SkipReason::UnsafePath {
                    tracing::warn!("refusing to extract {name}");
                }
                summary.skipped += 1;
                continue;
            }
            EntryDisposition::Extract {
                relative,
                is_dir,
                mismatched,
            } => (relative, is_dir || entry.is_dir(), mismatched),
        };

        if mismatched {
            summary.mismatched.push(name.clone());
        }

        let mode = entry.unix_mode().map(|m| m & 0o777).unwrap_or(0);
        tracing::debug!("extracting {name} ({mode:o})");

        let target = destination.join(&relative);
        let extract_err = |source| InstallError::Extraction {
            entry: name.clone(),
            source,
        };

        if is_dir {
            fs::create_dir_all(&target).map_err(extract_err)?;
            summary.directories += 1;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(extract_err)?;
            }
            let mut out = File::create(&target).map_err(extract_err)?;
            io::copy(&mut entry, &mut out).map_err(extract_err)?;
            summary.files += 1;
        }

        if mode != 0 {
            set_mode(&target, mode).map_err(extract_err)?;
        }
    }

    Ok(summary)
}

fn zip_to_io(e: zip::result::ZipError) -> io::Error {
    match e {
        zip::result::ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
