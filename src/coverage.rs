//! Coverage map path patching
//!
//! Coverage mappings in the linked binary record the builder's sandbox
//! paths. The project's `post_processor` rewrites them to the workspace root
//! so the IDE can attribute coverage to its files. Nothing here fails the
//! build.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

/// Inputs for one patching run
#[derive(Debug, Clone)]
pub struct CoverageRequest<'a> {
    pub post_processor: &'a Path,
    /// Linked binary Xcode runs
    pub binary: Option<&'a Path>,
    /// Build workspace root, when the bin directory resolved
    pub build_root: Option<&'a Path>,
    pub workspace_root: &'a Path,
    pub verbose: bool,
}

/// Result of a patching run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverageOutcome {
    Patched,
    /// Nothing to patch; the binary was not produced
    Skipped,
    /// Problem to surface as an IDE warning
    Warning(String),
}

/// Arguments for `post_processor` in coverage mode
pub fn post_processor_args(
    binary: &Path,
    build_root: &Path,
    workspace_root: &Path,
    verbose: bool,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-c".into()];
    if verbose {
        args.push("-v".into());
    }
    args.push(binary.into());
    args.push(build_root.into());
    args.push(workspace_root.into());
    args
}

/// Rewrite coverage map paths in the built binary
pub fn patch_coverage_maps(request: &CoverageRequest<'_>) -> CoverageOutcome {
    let Some(build_root) = request.build_root else {
        return CoverageOutcome::Warning(
            "no build workspace root was detected, unable to determine coverage paths to patch; \
             code coverage will probably fail"
                .to_string(),
        );
    };
    let Some(binary) = request.binary.filter(|b| b.is_file()) else {
        return CoverageOutcome::Skipped;
    };

    tracing::info!(
        "patching coverage paths {} -> {}",
        build_root.display(),
        request.workspace_root.display()
    );
    let args = post_processor_args(binary, build_root, request.workspace_root, request.verbose);
    let output = match Command::new(request.post_processor).args(&args).output() {
        Ok(output) => output,
        Err(e) => {
            return CoverageOutcome::Warning(format!(
                "failed to run {}: {e}; code coverage will probably fail",
                request.post_processor.display()
            ))
        }
    };

    if output.status.success() {
        return CoverageOutcome::Patched;
    }

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let text = text.trim();
    CoverageOutcome::Warning(format!(
        "coverage map patching failed on binary {} ({}); code coverage will probably fail. Output: {}",
        binary.display(),
        output.status.code().unwrap_or(-1),
        if text.is_empty() { "<no output>" } else { text }
    ))
}
