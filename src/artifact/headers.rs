//! Generated header links
//!
//! Headers produced by the builder live deep inside its output tree. The IDE
//! indexes them through stable symlinks below
//! `<workspace>/xcbridge-includes/x/x/`. The two `x` components keep the
//! number of directory levels between the headers root and the workspace the
//! same as between the builder's output root and its workspace, so relative
//! include paths resolve identically.

use std::fs;
use std::path::{Path, PathBuf};

use super::copy::{make_symlink, remove_existing};
use super::{ArtifactManifest, InstallError, InstallResult};

/// Directory name of the headers root inside the workspace
pub const HEADERS_ROOT_NAME: &str = "xcbridge-includes";

/// Counters from one header installation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSummary {
    pub linked: usize,
    /// Declared outputs the builder never produced
    pub missing: usize,
}

/// Headers root for a workspace
pub fn headers_root(workspace_root: &Path) -> PathBuf {
    workspace_root.join(HEADERS_ROOT_NAME)
}

/// Link every live generated source from `manifests`
///
/// The headers root is reset first so links from earlier builds do not
/// linger. Real paths are resolved against `build_root`.
pub fn install_generated_headers(
    manifests: &[ArtifactManifest],
    workspace_root: &Path,
    build_root: &Path,
) -> InstallResult<HeaderSummary> {
    let root = headers_root(workspace_root);
    let header_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| InstallError::Headers { path, source }
    };

    remove_existing(&root).map_err(header_err(&root))?;
    fs::create_dir_all(&root).map_err(header_err(&root))?;

    let link_base = root.join("x").join("x");
    let mut summary = HeaderSummary::default();

    for generated in manifests.iter().flat_map(|m| &m.generated_sources) {
        let src = build_root.join(&generated.real_path);

        // Declared but never produced when nothing depends on it.
        if !src.exists() {
            summary.missing += 1;
            continue;
        }

        let dst = link_base.join(&generated.link_path);
        tracing::debug!("linking {} to {}", src.display(), dst.display());

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(header_err(parent))?;
        }
        // symlink_metadata also sees dangling links.
        if fs::symlink_metadata(&dst).is_ok() {
            fs::remove_file(&dst).map_err(header_err(&dst))?;
        }
        make_symlink(&src, &dst).map_err(header_err(&dst))?;
        summary.linked += 1;
    }

    Ok(summary)
}
