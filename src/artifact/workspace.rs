//! Builder bin directory resolution and workspace link
//!
//! The builder's bin symlink resolves to a path of the form
//! `<output base>/execroot/<workspace>/<out>/<config>/bin`. Dropping the last
//! three components yields the build workspace root, which is where paths in
//! manifests and debug info are relative to.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::copy::make_symlink;
use super::{InstallError, InstallResult};

/// Name of the link from the IDE workspace to the build workspace root
pub const WORKSPACE_LINK_NAME: &str = "xcbridge-workspace";

/// Resolved bin directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinDirectory {
    /// Real path of the bin directory, if it exists
    pub resolved: Option<PathBuf>,
    /// Build workspace root derived from `resolved`
    pub build_root: Option<PathBuf>,
    pub warnings: Vec<String>,
}

/// Resolve the bin link and derive the build workspace root
pub fn resolve_bin_dir(bin_path: &Path) -> InstallResult<BinDirectory> {
    let mut result = BinDirectory::default();

    let meta = match fs::symlink_metadata(bin_path) {
        Ok(meta) => meta,
        Err(_) => {
            result
                .warnings
                .push(format!("builder bin path at {} does not exist", bin_path.display()));
            return Ok(result);
        }
    };

    // A link whose target was cleaned away is recreated.
    if meta.file_type().is_symlink() && !bin_path.exists() {
        let target = fs::read_link(bin_path).map_err(|source| InstallError::BinDirectory {
            path: bin_path.to_path_buf(),
            source,
        })?;
        let target = match bin_path.parent() {
            Some(parent) if target.is_relative() => parent.join(target),
            _ => target,
        };
        fs::create_dir_all(&target)
            .map_err(|source| InstallError::BinDirectory { path: target, source })?;
    }

    let resolved = fs::canonicalize(bin_path).map_err(|source| InstallError::BinDirectory {
        path: bin_path.to_path_buf(),
        source,
    })?;

    result.build_root = build_root_of(&resolved);
    if result.build_root.is_none() {
        result.warnings.push(format!(
            "failed to derive build workspace root from {}",
            resolved.display()
        ));
    }
    result.resolved = Some(resolved);

    Ok(result)
}

/// Drop the last three components; needs at least five including the root
pub fn build_root_of(resolved: &Path) -> Option<PathBuf> {
    if resolved.components().count() < 5 {
        return None;
    }
    resolved.ancestors().nth(3).map(Path::to_path_buf)
}

/// Point `<workspace>/xcbridge-workspace` at the build workspace root
pub fn link_workspace(workspace_root: &Path, build_root: &Path) -> InstallResult<PathBuf> {
    let link = workspace_root.join(WORKSPACE_LINK_NAME);
    let link_err = |source| InstallError::WorkspaceLink {
        path: link.clone(),
        source,
    };

    if let Ok(meta) = fs::symlink_metadata(&link) {
        if meta.file_type().is_symlink() {
            fs::remove_file(&link).map_err(link_err)?;
        }
    }
    make_symlink(build_root, &link).map_err(link_err)?;

    if !link.exists() {
        return Err(link_err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("link target {} does not exist", build_root.display()),
        )));
    }
    Ok(link)
}
