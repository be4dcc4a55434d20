//! Code signing tool invocations

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{SigningError, SigningResult};

/// Status and combined stdout/stderr of a tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub status: i32,
    pub output: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// The signing tools the bridge drives
pub trait CodesignTool {
    /// Describe a signed bundle (`codesign -dvv`)
    fn display(&self, bundle: &Path) -> SigningResult<ToolOutput>;

    /// Re-sign a bundle; entitlements are preserved when none are given
    fn sign(
        &self,
        bundle: &Path,
        identity: &str,
        entitlements: Option<&Path>,
    ) -> SigningResult<ToolOutput>;

    /// Decode a provisioning profile into its plist text
    fn decode_profile(&self, profile: &Path) -> SigningResult<ToolOutput>;
}

/// `xcrun codesign` / `xcrun security`
#[derive(Debug, Clone)]
pub struct XcrunCodesign {
    xcrun: PathBuf,
}

impl Default for XcrunCodesign {
    fn default() -> Self {
        Self {
            xcrun: PathBuf::from("xcrun"),
        }
    }
}

impl XcrunCodesign {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&self, args: &[&std::ffi::OsStr]) -> SigningResult<ToolOutput> {
        tracing::debug!(?args, "running xcrun");
        let output = Command::new(&self.xcrun)
            .args(args)
            .output()
            .map_err(|source| SigningError::Tool {
                tool: self.xcrun.display().to_string(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ToolOutput {
            status: output.status.code().unwrap_or(1),
            output: text,
        })
    }
}

impl CodesignTool for XcrunCodesign {
    fn display(&self, bundle: &Path) -> SigningResult<ToolOutput> {
        self.run(&["codesign".as_ref(), "-dvv".as_ref(), bundle.as_os_str()])
    }

    fn sign(
        &self,
        bundle: &Path,
        identity: &str,
        entitlements: Option<&Path>,
    ) -> SigningResult<ToolOutput> {
        let mut args: Vec<&std::ffi::OsStr> = vec![
            "codesign".as_ref(),
            "-f".as_ref(),
            "--timestamp=none".as_ref(),
            "-s".as_ref(),
            identity.as_ref(),
        ];
        match entitlements {
            Some(path) => {
                args.push("--entitlements".as_ref());
                args.push(path.as_os_str());
            }
            None => args.push("--preserve-metadata=entitlements".as_ref()),
        }
        args.push(bundle.as_os_str());
        self.run(&args)
    }

    fn decode_profile(&self, profile: &Path) -> SigningResult<ToolOutput> {
        self.run(&[
            "security".as_ref(),
            "cms".as_ref(),
            "-D".as_ref(),
            "-i".as_ref(),
            profile.as_os_str(),
        ])
    }
}
