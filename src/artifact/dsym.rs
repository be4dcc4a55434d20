//! Debug symbol bundle installation

use std::path::{Path, PathBuf};

use super::copy::{copy_bundle, remove_existing};
use super::{InstallError, InstallResult};

/// Where to look for a dSYM and where it goes
#[derive(Debug, Clone)]
pub struct DsymRequest<'a> {
    /// DWARF_DSYM_FILE_NAME; nothing is installed when unset
    pub dsym_name: Option<&'a str>,
    /// Builder output directory for this target
    pub build_dir: &'a Path,
    /// Xcode's built products directory
    pub output_dir: &'a Path,
    /// Fallback dSYM named after the linked binary rather than the bundle
    pub binary_dsym: Option<&'a str>,
    /// Prefix stripped from `binary_dsym` when present
    pub build_path_prefix: Option<&'a str>,
}

/// Outcome of a dSYM installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DsymOutcome {
    /// No dSYM requested or none found
    NotInstalled,
    Installed(PathBuf),
}

/// Copy the target's dSYM bundle next to the built products
///
/// Failing to remove a stale dSYM is an install error (700); a failed copy is
/// a copy error (650).
pub fn install_dsym(request: &DsymRequest<'_>) -> InstallResult<DsymOutcome> {
    let Some(name) = request.dsym_name else {
        return Ok(DsymOutcome::NotInstalled);
    };

    let output = request.output_dir.join(name);
    remove_existing(&output).map_err(|source| InstallError::Dsym {
        path: output.clone(),
        source,
    })?;

    let Some(source) = locate_dsym(request, name) else {
        tracing::debug!("no dSYM found for {name}");
        return Ok(DsymOutcome::NotInstalled);
    };

    copy_bundle(&source, &output)?;
    Ok(DsymOutcome::Installed(output))
}

fn locate_dsym(request: &DsymRequest<'_>, name: &str) -> Option<PathBuf> {
    let primary = request.build_dir.join(name);
    if primary.is_dir() {
        return Some(primary);
    }

    let binary_dsym = request.binary_dsym?;
    let relative = match request.build_path_prefix {
        Some(prefix) if !prefix.is_empty() => binary_dsym
            .strip_prefix(prefix)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(binary_dsym),
        _ => binary_dsym,
    };
    let fallback = request.build_dir.join(relative);
    fallback.is_dir().then_some(fallback)
}
