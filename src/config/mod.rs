//! Configuration for a bridge run
//!
//! Three inputs shape a run:
//! 1. Bridge settings (`.xcbridge/config.toml` or `--config`)
//! 2. The Xcode build environment
//! 3. CLI options, from which the builder command is derived

mod defaults;
mod env;
mod options;

use std::path::PathBuf;

use thiserror::Error;

use crate::summary::ExitCode;

pub use defaults::{
    BridgeSettings, DebuggerFiles, DebuggerSettings, TelemetrySettings, DEFAULT_MANIFEST_SUFFIX,
    DEFAULT_POLL_INTERVAL_MS,
};
pub use env::BridgeEnv;
#[cfg(test)]
pub(crate) use env::tests;
pub use options::{
    xcode_version_flag_value, BuildCommand, BuildConfiguration, BuildOptions, CommandError,
    DEFAULT_BIN_PATH, TEST_RUNNER_PREFIX,
};

/// Settings file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn exit_code(&self) -> i32 {
        ExitCode::InvalidOptions.as_i32()
    }
}

/// Build environment errors
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required build setting {0} is not set")]
    Missing(&'static str),

    #[error("build setting {name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("cannot determine working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
}

impl EnvError {
    pub fn exit_code(&self) -> i32 {
        ExitCode::InvalidOptions.as_i32()
    }
}
