//! Artifact installation
//!
//! Places the builder's outputs where Xcode expects them:
//! - the primary artifact (archive, plain file or directory bundle)
//! - generated header links
//! - debug symbol bundles
//!
//! Failures map to the 6xx band, header failures to 680 and dSYM failures to
//! 700, so the IDE can tell installation problems from build problems.

mod archive;
mod copy;
mod dsym;
mod headers;
mod manifest;
mod workspace;

use std::io;
use std::path::{Path, PathBuf};

use bridge_layout::{
    expected_bundle_name, resolve_layout, ArchiveKind, LayoutQuery, PackageType, Platform,
    ProductType,
};
use thiserror::Error;

use crate::config::BridgeEnv;
use crate::summary::ExitCode;

pub use archive::{unpack, UnpackSummary};
pub use copy::{copy_bundle, copy_file, make_symlink, remove_existing};
pub use dsym::{install_dsym, DsymOutcome, DsymRequest};
pub use headers::{headers_root, install_generated_headers, HeaderSummary, HEADERS_ROOT_NAME};
pub use manifest::{ArtifactManifest, GeneratedSource};
pub use workspace::{
    build_root_of, link_workspace, resolve_bin_dir, BinDirectory, WORKSPACE_LINK_NAME,
};

/// Installation errors
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to remove stale output {path}: {source}")]
    StaleOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to load output manifest {path}: {reason}")]
    ManifestUnreadable { path: PathBuf, reason: String },

    #[error("output manifest {manifest} does not name an artifact")]
    MissingPrimaryArtifact { manifest: PathBuf },

    #[error("copy failed for {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("generated archive not found at {0}")]
    ArchiveMissing(PathBuf),

    #[error("failed to extract {entry}: {source}")]
    Extraction {
        entry: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to install generated headers at {path}: {source}")]
    Headers {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install dSYM bundle at {path}: {source}")]
    Dsym {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to prepare builder bin directory {path}: {source}")]
    BinDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("linking workspace at {path} failed: {source}")]
    WorkspaceLink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InstallError {
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            InstallError::StaleOutput { .. } => ExitCode::StaleOutput,
            InstallError::ManifestUnreadable { .. } => ExitCode::ManifestUnreadable,
            InstallError::MissingPrimaryArtifact { .. } => ExitCode::MissingPrimaryArtifact,
            InstallError::Copy { .. } => ExitCode::CopyFailed,
            InstallError::ArchiveMissing(_) => ExitCode::ArchiveMissing,
            InstallError::Extraction { .. } => ExitCode::ExtractionFailed,
            InstallError::Headers { .. } => ExitCode::HeaderInstall,
            InstallError::Dsym { .. } => ExitCode::DsymInstall,
            InstallError::BinDirectory { .. } | InstallError::WorkspaceLink { .. } => {
                ExitCode::BinDirectory
            }
        };
        code.as_i32()
    }
}

/// Result type for installation
pub type InstallResult<T> = Result<T, InstallError>;

/// What Xcode is building, as far as bundle layout is concerned
#[derive(Debug, Clone)]
pub struct BundleTarget {
    pub product_type: ProductType,
    pub package_type: Option<PackageType>,
    pub platform: Platform,
    /// Bundle suffix Xcode expects, e.g. `.app`
    pub wrapper_suffix: String,
}

impl BundleTarget {
    pub fn from_env(env: &BridgeEnv) -> Self {
        Self {
            product_type: env.product_type.clone(),
            package_type: env.package_type.clone(),
            platform: env.platform.clone(),
            wrapper_suffix: env.wrapper_suffix.clone(),
        }
    }
}

/// How the primary artifact was placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallKind {
    Unpacked(UnpackSummary),
    File,
    Bundle { files: usize },
}

/// Result of a primary artifact installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub kind: InstallKind,
    pub destination: PathBuf,
    /// Non-fatal problems to surface as IDE warnings
    pub warnings: Vec<String>,
}

/// Installs the primary artifact named by a manifest
#[derive(Debug, Clone)]
pub struct ArtifactInstaller {
    target: BundleTarget,
    /// Base for relative artifact paths
    artifact_root: PathBuf,
}

impl ArtifactInstaller {
    pub fn new(target: BundleTarget, artifact_root: PathBuf) -> Self {
        Self {
            target,
            artifact_root,
        }
    }

    /// Clear `destination` and place the manifest's primary artifact there
    pub fn install(
        &self,
        manifest: &ArtifactManifest,
        destination: &Path,
    ) -> InstallResult<InstallReport> {
        remove_existing(destination).map_err(|source| InstallError::StaleOutput {
            path: destination.to_path_buf(),
            source,
        })?;

        let primary = manifest.resolved_primary_artifact(&self.artifact_root)?;
        let mut warnings = Vec::new();

        let kind = match ArchiveKind::from_path(&primary) {
            Some(archive) => {
                let bundle_name = expected_bundle_name(
                    manifest.bundle_name.as_deref(),
                    &primary,
                    &self.target.wrapper_suffix,
                );
                let query = LayoutQuery {
                    product_type: &self.target.product_type,
                    package_type: self.target.package_type.as_ref(),
                    platform: &self.target.platform,
                    archive,
                };
                let layout = resolve_layout(&query, &bundle_name);
                let summary = unpack(&primary, destination, &layout)?;

                warnings.extend(summary.mismatched.iter().map(|entry| {
                    format!(
                        "mismatched extraction path: archive content at \"{entry}\" expected to have subpath of \"{}\"",
                        layout.subpath
                    )
                }));
                InstallKind::Unpacked(summary)
            }
            None if primary.is_file() => {
                copy_file(&primary, destination)?;
                InstallKind::File
            }
            None => {
                let files = copy_bundle(&primary, destination)?;
                InstallKind::Bundle { files }
            }
        };

        Ok(InstallReport {
            kind,
            destination: destination.to_path_buf(),
            warnings,
        })
    }
}
