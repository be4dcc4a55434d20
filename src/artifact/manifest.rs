//! Builder output manifest
//!
//! The builder writes one JSON manifest per target describing what it
//! produced:
//!
//! ```json
//! {
//!   "artifacts": ["bazel-out/ios-arm64/bin/app/App.ipa"],
//!   "bundle_name": "App",
//!   "generated_sources": [["bazel-out/.../Gen.h", "app/Gen.h"]]
//! }
//! ```
//!
//! The first artifact is the primary one. Relative paths are resolved against
//! the build workspace root.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{InstallError, InstallResult};

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    artifacts: Option<Vec<String>>,
    #[serde(default)]
    bundle_name: Option<String>,
    #[serde(default)]
    generated_sources: Vec<(String, String)>,
}

/// A generated source the IDE should see under a stable path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    /// Output path, relative to the build workspace root
    pub real_path: PathBuf,
    /// Path below the headers root where the link is created
    pub link_path: PathBuf,
}

/// Parsed manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactManifest {
    /// Where the manifest was read from
    pub path: PathBuf,
    pub artifacts: Vec<PathBuf>,
    pub bundle_name: Option<String>,
    pub generated_sources: Vec<GeneratedSource>,
}

impl ArtifactManifest {
    /// Read and parse a manifest file
    pub fn load(path: &Path) -> InstallResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| InstallError::ManifestUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, path)
    }

    /// Parse manifest JSON; `path` is used for diagnostics only
    pub fn parse(text: &str, path: &Path) -> InstallResult<Self> {
        let raw: RawManifest =
            serde_json::from_str(text).map_err(|e| InstallError::ManifestUnreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            artifacts: raw
                .artifacts
                .unwrap_or_default()
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            bundle_name: raw.bundle_name.filter(|n| !n.is_empty()),
            generated_sources: raw
                .generated_sources
                .into_iter()
                .map(|(real, link)| GeneratedSource {
                    real_path: PathBuf::from(real),
                    link_path: PathBuf::from(link),
                })
                .collect(),
        })
    }

    /// The artifact Xcode expects at its output path
    pub fn primary_artifact(&self) -> InstallResult<&Path> {
        self.artifacts
            .first()
            .map(PathBuf::as_path)
            .ok_or_else(|| InstallError::MissingPrimaryArtifact {
                manifest: self.path.clone(),
            })
    }

    /// Primary artifact resolved against `base` when relative
    pub fn resolved_primary_artifact(&self, base: &Path) -> InstallResult<PathBuf> {
        let primary = self.primary_artifact()?;
        Ok(if primary.is_absolute() {
            primary.to_path_buf()
        } else {
            base.join(primary)
        })
    }
}
