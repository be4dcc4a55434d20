//! Bridge settings with built-in defaults
//!
//! Settings come from an optional TOML file. Every key is optional; missing
//! keys fall back to the built-in defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::ConfigError;

/// Default poll interval for the event log watch loop
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default suffix identifying manifest files in the builder's outputs
pub const DEFAULT_MANIFEST_SUFFIX: &str = ".manifest";

/// Default TSD port
pub const DEFAULT_TELEMETRY_PORT: u16 = 4242;

/// Default remote prefix the builder writes into debug info
pub const DEFAULT_REMOTE_SOURCE_PREFIX: &str = "/__BUILD_WORKSPACE_DIR__";

/// Bridge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Sleep between watch loop iterations (default: 100ms)
    pub poll_interval_ms: u64,

    /// Suffix of manifest paths in the builder's output file sets
    pub manifest_suffix: String,

    /// Directory for the event log (default: `<project>/.xcbridge`)
    pub event_log_dir: Option<PathBuf>,

    /// Flags appended to every builder invocation
    pub extra_build_flags: Vec<String>,

    /// Metrics endpoint
    pub telemetry: TelemetrySettings,

    /// Debugger configuration files
    pub debugger: DebuggerSettings,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            manifest_suffix: DEFAULT_MANIFEST_SUFFIX.to_string(),
            event_log_dir: None,
            extra_build_flags: Vec::new(),
            telemetry: TelemetrySettings::default(),
            debugger: DebuggerSettings::default(),
        }
    }
}

/// Metrics endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// TSD host; telemetry is off when unset
    pub host: Option<String>,

    /// TSD port (default: 4242)
    pub port: u16,

    /// Connect and write timeout in seconds (default: 5)
    pub timeout_seconds: u64,

    /// Prefix for metric names (default: "xcbridge")
    pub metric_prefix: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_TELEMETRY_PORT,
            timeout_seconds: 5,
            metric_prefix: "xcbridge".to_string(),
        }
    }
}

/// Debugger configuration file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerSettings {
    /// Init file the debugger loads at startup, which receives the managed
    /// block (default: `~/.lldbinit-Xcode` if present, else `~/.lldbinit`)
    pub global_init_file: Option<PathBuf>,

    /// File rewritten every run with the source map, sourced from the
    /// managed block (default: `~/.lldbinit-xcbridge`)
    pub session_file: Option<PathBuf>,

    /// Optional user file sourced after the source map
    /// (default: `~/.lldbinit-xcbridge-epilogue`)
    pub epilogue_file: Option<PathBuf>,

    /// Source prefix the builder writes into debug info
    pub remote_source_prefix: String,
}

impl Default for DebuggerSettings {
    fn default() -> Self {
        Self {
            global_init_file: None,
            session_file: None,
            epilogue_file: None,
            remote_source_prefix: DEFAULT_REMOTE_SOURCE_PREFIX.to_string(),
        }
    }
}

/// Resolved debugger file locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerFiles {
    pub global_init: PathBuf,
    pub session_file: PathBuf,
    pub epilogue_file: PathBuf,
}

/// Init file Xcode's debugger reads in preference to `~/.lldbinit`
pub const XCODE_INIT_FILE_NAME: &str = ".lldbinit-Xcode";

/// Init file the debugger reads when no Xcode specific one exists
pub const DEFAULT_INIT_FILE_NAME: &str = ".lldbinit";

impl DebuggerSettings {
    /// Resolve file locations against a home directory
    pub fn resolve(&self, home: &Path) -> DebuggerFiles {
        let pick = |configured: &Option<PathBuf>, default_name: &str| match configured {
            Some(p) => expand_home(p, home),
            None => home.join(default_name),
        };

        let global_init = match &self.global_init_file {
            Some(p) => expand_home(p, home),
            None => {
                let xcode = home.join(XCODE_INIT_FILE_NAME);
                if xcode.is_file() {
                    xcode
                } else {
                    home.join(DEFAULT_INIT_FILE_NAME)
                }
            }
        };

        DebuggerFiles {
            global_init,
            session_file: pick(&self.session_file, ".lldbinit-xcbridge"),
            epilogue_file: pick(&self.epilogue_file, ".lldbinit-xcbridge-epilogue"),
        }
    }
}

fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

impl BridgeSettings {
    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load settings from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load the explicit file if given, else the default file if present,
    /// else built-in defaults
    pub fn load(explicit: Option<&Path>, default_path: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if default_path.is_file() => Self::from_file(default_path),
            None => Ok(Self::default()),
        }
    }

    /// Validate value bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_ms must be in (0, 10000], got {}",
                self.poll_interval_ms
            )));
        }
        if self.manifest_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "manifest_suffix must not be empty".to_string(),
            ));
        }
        if self.telemetry.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "telemetry.timeout_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = BridgeSettings::default();
        assert_eq!(settings.poll_interval_ms, 100);
        assert_eq!(settings.manifest_suffix, ".manifest");
        assert!(settings.telemetry.host.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = BridgeSettings::from_toml_str(
            r#"
            poll_interval_ms = 250

            [telemetry]
            host = "metrics.local"
            "#,
        )
        .unwrap();

        assert_eq!(settings.poll_interval_ms, 250);
        assert_eq!(settings.manifest_suffix, DEFAULT_MANIFEST_SUFFIX);
        assert_eq!(settings.telemetry.host.as_deref(), Some("metrics.local"));
        assert_eq!(settings.telemetry.port, DEFAULT_TELEMETRY_PORT);
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let settings = BridgeSettings {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_debugger_files_resolve_against_home() {
        let settings = DebuggerSettings {
            epilogue_file: Some(PathBuf::from("~/custom/epilogue")),
            session_file: Some(PathBuf::from("/abs/session")),
            ..Default::default()
        };
        let files = settings.resolve(Path::new("/nonexistent/home"));

        assert_eq!(files.global_init, PathBuf::from("/nonexistent/home/.lldbinit"));
        assert_eq!(files.session_file, PathBuf::from("/abs/session"));
        assert_eq!(files.epilogue_file, PathBuf::from("/nonexistent/home/custom/epilogue"));
    }

    #[test]
    fn test_xcode_init_file_preferred_when_present() {
        let home = tempfile::TempDir::new().unwrap();
        let settings = DebuggerSettings::default();
        assert_eq!(
            settings.resolve(home.path()).global_init,
            home.path().join(DEFAULT_INIT_FILE_NAME)
        );

        fs::write(home.path().join(XCODE_INIT_FILE_NAME), "").unwrap();
        let files = settings.resolve(home.path());
        assert_eq!(files.global_init, home.path().join(XCODE_INIT_FILE_NAME));
        assert_eq!(files.session_file, home.path().join(".lldbinit-xcbridge"));
    }

    #[test]
    fn test_load_falls_back_to_defaults() {
        let settings =
            BridgeSettings::load(None, Path::new("/nonexistent/xcbridge/config.toml")).unwrap();
        assert_eq!(settings.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }
}
