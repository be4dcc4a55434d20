//! Builder invocation options and command derivation

use std::path::{Path, PathBuf};

use bridge_layout::PlatformFamily;
use regex_lite::Regex;
use thiserror::Error;

use super::{BridgeEnv, BridgeSettings};
use crate::summary::ExitCode;

/// Prefix Xcode puts on configurations generated for test runner schemes
pub const TEST_RUNNER_PREFIX: &str = "__TestRunner_";

/// Default location of the builder's output symlink, relative to the workspace
pub const DEFAULT_BIN_PATH: &str = "bazel-bin";

/// Command derivation errors
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("configuration {0:?} is only valid for test runner targets")]
    TestRunnerOnly(String),

    #[error("unknown build configuration {0:?}")]
    UnknownConfiguration(String),

    #[error("no build targets given")]
    NoTargets,
}

impl CommandError {
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            CommandError::TestRunnerOnly(_) | CommandError::UnknownConfiguration(_) => {
                ExitCode::ConfigurationRejected
            }
            CommandError::NoTargets => ExitCode::Usage,
        };
        code.as_i32()
    }
}

/// Already-merged inputs for one builder invocation
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Path to the builder executable
    pub builder: PathBuf,
    pub targets: Vec<String>,
    /// Options placed before the `build` verb
    pub startup_options: Vec<String>,
    /// Options placed after the `build` verb
    pub build_options: Vec<String>,
    /// Builder output symlink, relative to the workspace root
    pub bin_path: PathBuf,
    /// Install artifacts into the locations Xcode expects
    pub install_generated_artifacts: bool,
    pub verbose: u8,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            builder: PathBuf::from("bazel"),
            targets: Vec::new(),
            startup_options: Vec::new(),
            build_options: Vec::new(),
            bin_path: PathBuf::from(DEFAULT_BIN_PATH),
            install_generated_artifacts: false,
            verbose: 0,
        }
    }
}

/// Build configurations the bridge knows defaults for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildConfiguration {
    Debug,
    Release,
    Fastbuild,
}

impl BuildConfiguration {
    /// Parse a configuration name after test runner normalisation
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Debug" => Some(BuildConfiguration::Debug),
            "Release" => Some(BuildConfiguration::Release),
            "Fastbuild" => Some(BuildConfiguration::Fastbuild),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuildConfiguration::Debug => "Debug",
            BuildConfiguration::Release => "Release",
            BuildConfiguration::Fastbuild => "Fastbuild",
        }
    }

    /// Builder flags every invocation of this configuration gets
    pub fn default_options(&self) -> &'static [&'static str] {
        match self {
            BuildConfiguration::Debug => &["--compilation_mode=dbg"],
            BuildConfiguration::Release => &["--compilation_mode=opt", "--strip=always"],
            BuildConfiguration::Fastbuild => &["--compilation_mode=fastbuild"],
        }
    }

    /// Strip the test runner prefix and resolve the configuration
    pub fn normalise(raw: &str, test_runner_only: bool) -> Result<Self, CommandError> {
        let name = match raw.strip_prefix(TEST_RUNNER_PREFIX) {
            Some(stripped) => stripped,
            None if test_runner_only => {
                return Err(CommandError::TestRunnerOnly(raw.to_string()));
            }
            None => raw,
        };
        Self::parse(name).ok_or_else(|| CommandError::UnknownConfiguration(name.to_string()))
    }
}

const COMMON_OPTIONS: &[&str] = &["--verbose_failures", "--announce_rc"];

/// Fully derived builder command line
#[derive(Debug, Clone)]
pub struct BuildCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub configuration: BuildConfiguration,
    /// Non-fatal problems found while deriving the command
    pub warnings: Vec<String>,
}

impl BuildCommand {
    /// Derive the builder invocation for one Xcode build
    pub fn derive(
        options: &BuildOptions,
        env: &BridgeEnv,
        settings: &BridgeSettings,
        event_log: &Path,
    ) -> Result<Self, CommandError> {
        if options.targets.is_empty() {
            return Err(CommandError::NoTargets);
        }

        let configuration =
            BuildConfiguration::normalise(&env.configuration, env.test_runner_only)?;
        let mut warnings = Vec::new();

        let family = env.platform.family();
        if family == PlatformFamily::Unknown {
            warnings.push(format!(
                "unknown platform {}, assuming ios",
                env.platform.name()
            ));
        }

        let mut args: Vec<String> = options.startup_options.clone();
        args.push("build".to_string());
        args.extend(COMMON_OPTIONS.iter().map(|s| s.to_string()));
        args.extend(configuration.default_options().iter().map(|s| s.to_string()));
        args.push(format!("--config={}_{}", family.config_name(), env.arch));
        args.extend(options.build_options.iter().cloned());

        if let Some(actual) = env.xcode_version_actual.as_deref() {
            match xcode_version_flag_value(actual) {
                Some(version) => {
                    add_default_option(&mut args, "--xcode_version", &version);
                }
                None => warnings.push(format!(
                    "cannot derive --xcode_version from XCODE_VERSION_ACTUAL={actual}"
                )),
            }
        }
        if let Some(sdk) = env.sdk_version.as_deref() {
            add_default_option(&mut args, family.sdk_version_flag(), sdk);
        }

        args.push(format!("--build_event_json_file={}", event_log.display()));
        args.extend(settings.extra_build_flags.iter().cloned());

        if env.coverage_enabled {
            args.push("--collect_code_coverage".to_string());
            args.push("--experimental_use_llvm_covmap".to_string());
        }
        if env.generate_dsym {
            args.push("--apple_generate_dsym".to_string());
        }

        args.extend(options.targets.iter().cloned());

        Ok(Self {
            program: options.builder.clone(),
            args,
            configuration,
            warnings,
        })
    }

    /// Render for logs
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Append `flag=value` unless the caller already passed `flag`
fn add_default_option(args: &mut Vec<String>, flag: &str, value: &str) {
    if args.iter().any(|a| a.starts_with(flag)) {
        return;
    }
    args.push(format!("{flag}={value}"));
}

/// Convert XCODE_VERSION_ACTUAL ("1131") into a dotted version ("11.3.1")
///
/// A zero fix component is dropped ("0940" becomes "9.4").
pub fn xcode_version_flag_value(actual: &str) -> Option<String> {
    let re = Regex::new(r"^(\d{2})(\d)(\d)$").ok()?;
    let caps = re.captures(actual.trim())?;
    let major: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str();
    let fix = caps.get(3)?.as_str();

    if fix == "0" {
        Some(format!("{major}.{minor}"))
    } else {
        Some(format!("{major}.{minor}.{fix}"))
    }
}
