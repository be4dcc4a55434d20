//! Build environment provided by Xcode
//!
//! Xcode exports its build settings as environment variables when it runs an
//! external build phase. `BridgeEnv` captures the subset the bridge needs.
//! The lookup is injectable so tests never touch the process environment.

use std::path::{Path, PathBuf};

use bridge_layout::{PackageType, Platform, ProductType};

use super::EnvError;

/// Per-configuration build environment
#[derive(Debug, Clone)]
pub struct BridgeEnv {
    /// Xcode action; an empty ACTION means "build"
    pub action: String,
    /// Build configuration name (Debug, Release, ...)
    pub configuration: String,
    pub platform: Platform,
    pub arch: String,
    pub sdk_version: Option<String>,
    pub product_type: ProductType,
    pub package_type: Option<PackageType>,
    pub target_build_dir: PathBuf,
    pub full_product_name: String,
    pub executable_path: Option<String>,
    /// Bundle suffix Xcode expects, e.g. `.app`
    pub wrapper_suffix: String,
    /// Target is an `.xctest` bundle
    pub is_test: bool,
    pub built_products_dir: PathBuf,
    pub derived_sources_dir: Option<PathBuf>,
    pub codesigning_folder_path: PathBuf,
    /// Signing requested and not a simulator build
    pub codesigning_allowed: bool,
    pub test_host: Option<PathBuf>,
    pub dwarf_dsym_file_name: Option<String>,
    pub coverage_enabled: bool,
    pub project_dir: PathBuf,
    pub project_file_path: PathBuf,
    pub xcode_version_actual: Option<String>,
    /// XCODE_VERSION_MINOR, e.g. 1130 for 11.3
    pub xcode_version_minor: u32,
    /// Directory containing the builder's workspace file
    pub workspace_root: PathBuf,
    /// Sub path of the bin directory holding this target's outputs
    pub build_path: Option<String>,
    pub generate_dsym: bool,
    pub use_debugger_init: bool,
    pub test_runner_only: bool,
    pub test_runner_provisioning_profile: Option<PathBuf>,
    /// Alternate dSYM when the binary's bundle name differs from the target's
    pub binary_dsym: Option<String>,
    /// Working directory: the Xcode project's main group
    pub main_group_path: PathBuf,
}

impl BridgeEnv {
    /// Build from the current process environment
    pub fn from_process_env() -> Result<Self, EnvError> {
        let cwd = std::env::current_dir().map_err(EnvError::WorkingDirectory)?;
        Self::from_lookup(|name| std::env::var(name).ok(), cwd)
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F, main_group_path: PathBuf) -> Result<Self, EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(EnvError::Missing(name));
        let optional = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let flag = |name: &str| lookup(name).as_deref() == Some("YES");

        let arch = required("CURRENT_ARCH")?;
        if arch.is_empty() {
            return Err(EnvError::Missing("CURRENT_ARCH"));
        }

        let platform = Platform::new(required("PLATFORM_NAME")?);
        let codesigning_allowed = !platform.is_simulator() && flag("CODE_SIGNING_ALLOWED");

        let xcode_version_minor = match optional("XCODE_VERSION_MINOR") {
            Some(v) => v.parse().map_err(|_| EnvError::Invalid {
                name: "XCODE_VERSION_MINOR",
                value: v.clone(),
            })?,
            None => 0,
        };

        let workspace_root = PathBuf::from(required("XCBRIDGE_WORKSPACE_ROOT")?);
        let workspace_root = if workspace_root.is_absolute() {
            workspace_root
        } else {
            main_group_path.join(workspace_root)
        };

        Ok(Self {
            action: optional("ACTION").unwrap_or_else(|| "build".to_string()),
            configuration: required("CONFIGURATION")?,
            platform,
            arch,
            sdk_version: optional("SDK_VERSION"),
            product_type: ProductType::from_identifier(&required("PRODUCT_TYPE")?),
            package_type: optional("PACKAGE_TYPE").map(|p| PackageType::from_identifier(&p)),
            target_build_dir: PathBuf::from(required("TARGET_BUILD_DIR")?),
            full_product_name: required("FULL_PRODUCT_NAME")?,
            executable_path: optional("EXECUTABLE_PATH"),
            wrapper_suffix: lookup("WRAPPER_SUFFIX").unwrap_or_default(),
            is_test: lookup("WRAPPER_EXTENSION").as_deref() == Some("xctest"),
            built_products_dir: PathBuf::from(required("BUILT_PRODUCTS_DIR")?),
            derived_sources_dir: optional("DERIVED_SOURCES_DIR").map(PathBuf::from),
            codesigning_folder_path: PathBuf::from(required("CODESIGNING_FOLDER_PATH")?),
            codesigning_allowed,
            test_host: optional("TEST_HOST").map(PathBuf::from),
            dwarf_dsym_file_name: optional("DWARF_DSYM_FILE_NAME"),
            coverage_enabled: flag("CLANG_COVERAGE_MAPPING"),
            project_dir: PathBuf::from(required("PROJECT_DIR")?),
            project_file_path: PathBuf::from(required("PROJECT_FILE_PATH")?),
            xcode_version_actual: optional("XCODE_VERSION_ACTUAL"),
            xcode_version_minor,
            workspace_root,
            build_path: optional("XCBRIDGE_BUILD_PATH"),
            generate_dsym: flag("XCBRIDGE_USE_DSYM"),
            use_debugger_init: flag("XCBRIDGE_USE_LLDBINIT"),
            test_runner_only: flag("XCBRIDGE_TEST_RUNNER_ONLY"),
            test_runner_provisioning_profile: optional("XCBRIDGE_TEST_RUNNER_PROVISIONING_PROFILE")
                .map(PathBuf::from),
            binary_dsym: optional("XCBRIDGE_BINARY_DSYM"),
            main_group_path,
        })
    }

    /// True when Xcode asked for a build (other actions are ignored)
    pub fn is_build_action(&self) -> bool {
        self.action == "build"
    }

    /// Where Xcode expects the primary artifact
    pub fn artifact_output_path(&self) -> PathBuf {
        self.target_build_dir.join(&self.full_product_name)
    }

    /// Where Xcode expects the linked binary
    pub fn binary_path(&self) -> Option<PathBuf> {
        self.executable_path
            .as_ref()
            .map(|p| self.target_build_dir.join(p))
    }

    /// Bridge support directory inside the project bundle
    pub fn support_dir(&self) -> PathBuf {
        self.project_file_path.join(".xcbridge")
    }

    /// Default settings file location
    pub fn default_settings_path(&self) -> PathBuf {
        self.support_dir().join("config.toml")
    }

    /// Xcode 7.3+ injects support frameworks into test hosts
    pub fn injects_test_frameworks(&self) -> bool {
        self.xcode_version_minor >= 730
    }

    /// Template for the UI test runner entitlements
    pub fn runner_entitlements_template(&self) -> PathBuf {
        let prefix = if self.platform.is_macos() { "macOS" } else { "iOS" };
        self.support_dir()
            .join("Resources")
            .join(format!("{prefix}XCTRunner.entitlements"))
    }

    /// Coverage path patcher shipped with the project
    pub fn post_processor(&self) -> PathBuf {
        self.support_dir().join("Utils").join("post_processor")
    }

    /// Directory the main group lives in differs from the project's directory
    pub fn main_group_is_relocated(&self) -> bool {
        self.main_group_path.as_path() != Path::new(&self.project_dir)
    }
}
