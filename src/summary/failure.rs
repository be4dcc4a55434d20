//! Failure stages and stable exit codes

use std::fmt;

/// Highest exit code the signing stage reports (`800 + tool status`)
pub const SIGNING_EXIT_CODE_MAX: i32 = 899;

/// Pipeline stage a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Option parsing, environment or configuration validation
    Options,
    /// Running the external builder and collecting its result
    Build,
    /// Placing the primary artifact
    ArtifactInstall,
    /// Linking generated headers
    HeaderInstall,
    /// Copying debug-symbol bundles
    DsymInstall,
    /// Re-signing installed bundles
    Signing,
    /// Rewriting the debugger configuration
    DebugPaths,
}

impl FailureStage {
    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            FailureStage::Options => "option parsing",
            FailureStage::Build => "build execution",
            FailureStage::ArtifactInstall => "artifact installation",
            FailureStage::HeaderInstall => "generated header installation",
            FailureStage::DsymInstall => "debug symbol installation",
            FailureStage::Signing => "code signing",
            FailureStage::DebugPaths => "debugger path update",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Stable exit codes owned by the bridge
///
/// A failing builder's own exit status is passed through verbatim and is not
/// represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Build configuration not allowed or unknown
    ConfigurationRejected = 1,
    /// Malformed options or environment
    InvalidOptions = 2,
    /// Usage error (no targets, no builder)
    Usage = 10,
    /// Builder could not be started or the event log could not be created
    BuilderLaunch = 100,
    /// Builder succeeded but never announced a manifest
    NoManifest = 101,
    /// Builder bin directory could not be prepared
    BinDirectory = 120,
    /// Stale output at the destination could not be removed
    StaleOutput = 600,
    /// Manifest missing or not parseable
    ManifestUnreadable = 601,
    /// Manifest does not name a primary artifact
    MissingPrimaryArtifact = 602,
    /// Copying a file or bundle failed
    CopyFailed = 650,
    /// Packaged archive not found
    ArchiveMissing = 670,
    /// Extracting an archive member failed
    ExtractionFailed = 671,
    /// Generated header links could not be created
    HeaderInstall = 680,
    /// Debug-symbol bundle could not be installed
    DsymInstall = 700,
    /// Signing failed; tool status is added on top
    Signing = 800,
    /// Debugger configuration update failed (reported, never returned)
    DebugPaths = 900,
}

impl ExitCode {
    /// Get the integer value of the exit code
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Stage this exit code reports
    pub fn stage(&self) -> Option<FailureStage> {
        match self {
            ExitCode::Success => None,
            ExitCode::ConfigurationRejected | ExitCode::InvalidOptions | ExitCode::Usage => {
                Some(FailureStage::Options)
            }
            ExitCode::BuilderLaunch | ExitCode::NoManifest | ExitCode::BinDirectory => {
                Some(FailureStage::Build)
            }
            ExitCode::StaleOutput
            | ExitCode::ManifestUnreadable
            | ExitCode::MissingPrimaryArtifact
            | ExitCode::CopyFailed
            | ExitCode::ArchiveMissing
            | ExitCode::ExtractionFailed => Some(FailureStage::ArtifactInstall),
            ExitCode::HeaderInstall => Some(FailureStage::HeaderInstall),
            ExitCode::DsymInstall => Some(FailureStage::DsymInstall),
            ExitCode::Signing => Some(FailureStage::Signing),
            ExitCode::DebugPaths => Some(FailureStage::DebugPaths),
        }
    }

    /// Exit code for a failed signing tool invocation
    pub fn signing_with_status(status: i32) -> i32 {
        (ExitCode::Signing.as_i32() + status.max(0)).min(SIGNING_EXIT_CODE_MAX)
    }

    /// Check if this exit code indicates success
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

impl Default for ExitCode {
    fn default() -> Self {
        ExitCode::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_codes_share_a_stage() {
        for code in [
            ExitCode::StaleOutput,
            ExitCode::ManifestUnreadable,
            ExitCode::MissingPrimaryArtifact,
            ExitCode::ExtractionFailed,
        ] {
            assert_eq!(code.stage(), Some(FailureStage::ArtifactInstall));
            assert!((600..700).contains(&code.as_i32()));
        }
    }

    #[test]
    fn test_stages_are_distinct() {
        assert_ne!(ExitCode::NoManifest.stage(), ExitCode::StaleOutput.stage());
        assert_eq!(ExitCode::Success.stage(), None);
        assert!(ExitCode::default().is_success());
    }

    #[test]
    fn test_signing_status_is_capped() {
        assert_eq!(ExitCode::signing_with_status(1), 801);
        assert_eq!(ExitCode::signing_with_status(-3), 800);
        assert_eq!(ExitCode::signing_with_status(500), SIGNING_EXIT_CODE_MAX);
    }
}
