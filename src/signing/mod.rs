//! Code signing of installed test artifacts
//!
//! Xcode injects its test frameworks into test bundles after the builder has
//! signed them, so those frameworks and the UI test runner need re-signing
//! with the builder's identity. Everything here is a no-op when signing is
//! disabled for the build.

mod attributes;
mod codesign;
mod entitlements;
mod test_host;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::summary::ExitCode;

pub use attributes::{AttributeCache, SigningAttributes, SIGNING_DISABLED_PLACEHOLDER};
pub use codesign::{CodesignTool, ToolOutput, XcrunCodesign};
pub use entitlements::{application_identifier_prefix, substitute_entitlements};
pub use test_host::{
    provision_test_runner, resign_test_artifacts, ProvisionOutcome, TestSigningPlan,
    TestSigningReport, EMBEDDED_PROFILE_NAME,
};

/// Frameworks Xcode injects into test bundles
pub const INJECTED_FRAMEWORKS: &[&str] = &["IDEBundleInjection", "XCTAutomationSupport", "XCTest"];

/// Signing errors
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("failed to run {tool}: {source}")]
    Tool {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("signing tool failed on {bundle} (status {status}): {output}")]
    Failed {
        bundle: PathBuf,
        status: i32,
        output: String,
    },

    #[error("no {attribute} found in signature of {bundle}")]
    MissingAttribute {
        bundle: PathBuf,
        attribute: &'static str,
    },

    #[error("entitlements file {path}: {source}")]
    Entitlements {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("provisioning profile {path}: {reason}")]
    Profile { path: PathBuf, reason: String },

    #[error("failed to install provisioning profile at {path}: {source}")]
    Provisioning {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SigningError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SigningError::Failed { status, .. } => ExitCode::signing_with_status(*status),
            SigningError::Provisioning { .. } => ExitCode::CopyFailed.as_i32(),
            _ => ExitCode::Signing.as_i32(),
        }
    }
}

/// Result type for signing
pub type SigningResult<T> = Result<T, SigningError>;

/// Signing operations with a per-run attribute cache
pub struct SigningService<T: CodesignTool> {
    tool: T,
    enabled: bool,
    cache: AttributeCache,
    app_identifiers: HashMap<PathBuf, String>,
}

impl<T: CodesignTool> SigningService<T> {
    pub fn new(tool: T, enabled: bool) -> Self {
        Self {
            tool,
            enabled,
            cache: AttributeCache::new(),
            app_identifiers: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cache(&self) -> &AttributeCache {
        &self.cache
    }

    /// Signing attributes of `bundle`, read at most once per path
    pub fn attributes(&mut self, bundle: &Path) -> SigningResult<SigningAttributes> {
        if !self.enabled {
            return Ok(SigningAttributes::disabled());
        }
        if let Some(cached) = self.cache.get(bundle) {
            return Ok(cached.clone());
        }

        let output = self.tool.display(bundle)?;
        if !output.success() {
            return Err(SigningError::Failed {
                bundle: bundle.to_path_buf(),
                status: output.status,
                output: output.output,
            });
        }

        let attrs = SigningAttributes::parse(&output.output);
        tracing::debug!(bundle = %bundle.display(), ?attrs, "read signing attributes");
        self.cache.insert(bundle.to_path_buf(), attrs.clone());
        Ok(attrs)
    }

    /// The identity `bundle` was signed with
    pub fn signing_identity(&mut self, bundle: &Path) -> SigningResult<String> {
        self.attributes(bundle)?
            .authority
            .ok_or_else(|| SigningError::MissingAttribute {
                bundle: bundle.to_path_buf(),
                attribute: "Authority",
            })
    }

    /// Re-sign `bundle`, preserving its entitlements unless new ones are given
    pub fn resign(
        &mut self,
        bundle: &Path,
        identity: &str,
        entitlements: Option<&Path>,
    ) -> SigningResult<()> {
        if !self.enabled {
            return Ok(());
        }

        tracing::info!(bundle = %bundle.display(), "re-signing");
        let output = self.tool.sign(bundle, identity, entitlements)?;
        if !output.success() {
            return Err(SigningError::Failed {
                bundle: bundle.to_path_buf(),
                status: output.status,
                output: output.output,
            });
        }
        Ok(())
    }

    /// Re-sign the injected test frameworks found inside `bundle`
    ///
    /// Returns how many were re-signed.
    pub fn resign_injected_dependents(
        &mut self,
        bundle: &Path,
        identity: &str,
    ) -> SigningResult<usize> {
        let frameworks = bundle.join("Frameworks");
        let mut signed = 0;
        for name in INJECTED_FRAMEWORKS {
            let framework = frameworks.join(format!("{name}.framework"));
            if framework.is_dir() {
                self.resign(&framework, identity, None)?;
                signed += 1;
            }
        }
        Ok(signed)
    }

    /// Application identifier prefix from a provisioning profile
    pub fn application_identifier(&mut self, profile: &Path) -> SigningResult<String> {
        if let Some(known) = self.app_identifiers.get(profile) {
            return Ok(known.clone());
        }

        let decoded = self.tool.decode_profile(profile)?;
        if !decoded.success() {
            return Err(SigningError::Profile {
                path: profile.to_path_buf(),
                reason: format!("decoding failed with status {}", decoded.status),
            });
        }
        let prefix = application_identifier_prefix(&decoded.output).ok_or_else(|| {
            SigningError::Profile {
                path: profile.to_path_buf(),
                reason: "no application-identifier entitlement".to_string(),
            }
        })?;

        self.app_identifiers
            .insert(profile.to_path_buf(), prefix.clone());
        Ok(prefix)
    }

    /// Instantiate an entitlements template at `output`
    pub fn synthesize_entitlements(
        &self,
        template: &Path,
        team_id: &str,
        bundle_id: &str,
        app_id: &str,
        output: &Path,
    ) -> SigningResult<PathBuf> {
        let entitlements_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| SigningError::Entitlements { path, source }
        };

        let text = fs::read_to_string(template).map_err(entitlements_err(template))?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(entitlements_err(parent))?;
        }
        if output.exists() {
            fs::remove_file(output).map_err(entitlements_err(output))?;
        }

        let rendered = substitute_entitlements(&text, team_id, bundle_id, app_id);
        fs::write(output, rendered).map_err(entitlements_err(output))?;
        Ok(output.to_path_buf())
    }
}
