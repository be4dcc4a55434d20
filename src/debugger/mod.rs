//! Debugger source-path remapping
//!
//! The builder compiles sources under a sandboxed prefix, so the debugger
//! needs `target.source-map` settings to find them in the IDE workspace.
//! Those settings go into a session file rewritten on every build. The init
//! file the debugger actually loads (`~/.lldbinit-Xcode`, else `~/.lldbinit`)
//! carries a managed block that sources the session file, so each debug
//! session picks up the latest mappings.

mod managed_block;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bridge_layout::ProductType;
use thiserror::Error;

use crate::config::DebuggerFiles;
use crate::summary::ExitCode;

pub use managed_block::{strip_managed_block, with_managed_block, BLOCK_END, BLOCK_START};

const BLOCK_HEADER: &str = "# Sources the debug info path remapping written by xcode-build-bridge.";
const SESSION_HEADER: &str = "# Generated by xcode-build-bridge; rewritten on every build.";

/// Debugger configuration errors
#[derive(Debug, Error)]
pub enum DebugPathError {
    #[error("failed to read debugger init file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write debugger file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DebugPathError {
    /// Reported alongside the warning; never used as the process exit code
    pub fn exit_code(&self) -> i32 {
        ExitCode::DebugPaths.as_i32()
    }
}

/// Result type for debugger path updates
pub type DebugPathResult<T> = Result<T, DebugPathError>;

/// One remote to local path remap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapping {
    /// Prefix recorded in debug info
    pub remote: String,
    pub local: PathBuf,
}

impl SourceMapping {
    pub fn new(remote: impl Into<String>, local: impl Into<PathBuf>) -> Self {
        Self {
            remote: remote.into(),
            local: local.into(),
        }
    }

    fn quoted(&self) -> String {
        format!("\"{}\" \"{}\"", self.remote, self.local.display())
    }
}

/// Files written by an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub global_init: PathBuf,
    pub session_file: PathBuf,
    /// Number of mappings written; zero when clearing
    pub mappings: usize,
    pub epilogue_sourced: bool,
}

/// Maintains the session file and the managed block that sources it
#[derive(Debug, Clone)]
pub struct DebugPathBridge {
    files: DebuggerFiles,
}

impl DebugPathBridge {
    pub fn new(files: DebuggerFiles) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &DebuggerFiles {
        &self.files
    }

    /// Watch companion binaries carry no sources to remap
    pub fn applies_to(product_type: &ProductType) -> bool {
        !product_type.is_watch_companion()
    }

    /// Write `source_map` (or a clear directive) to the session file and
    /// make sure the global init file sources it
    pub fn update(&self, source_map: &[SourceMapping], clear: bool) -> DebugPathResult<UpdateOutcome> {
        let DebuggerFiles {
            global_init,
            session_file,
            epilogue_file,
        } = &self.files;

        let mut session = vec![SESSION_HEADER.to_string()];
        let mappings = if clear {
            session.push("settings clear target.source-map".to_string());
            0
        } else if source_map.is_empty() {
            0
        } else {
            let mut pairs: Vec<String> = source_map.iter().map(SourceMapping::quoted).collect();
            // Longer prefixes sort first so they win on overlap.
            pairs.sort_by(|a, b| b.cmp(a));
            session.push(format!("settings set target.source-map {}", pairs.join(" ")));
            pairs.len()
        };

        let epilogue_sourced = epilogue_file.is_file();
        if epilogue_sourced {
            session.push(format!("command source {}", epilogue_file.display()));
        }

        let mut content = session.join("\n");
        content.push('\n');
        write_file(session_file, &content)?;

        self.link_session(global_init, session_file)?;

        tracing::debug!(
            global_init = %global_init.display(),
            session_file = %session_file.display(),
            mappings,
            clear,
            "updated debugger source map"
        );

        Ok(UpdateOutcome {
            global_init: global_init.clone(),
            session_file: session_file.clone(),
            mappings,
            epilogue_sourced,
        })
    }

    /// Replace the managed block of `global_init` with a `command source`
    /// of the session file, keeping everything else byte for byte
    fn link_session(&self, global_init: &Path, session_file: &Path) -> DebugPathResult<()> {
        let existing = match fs::read_to_string(global_init) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(DebugPathError::Read {
                    path: global_init.to_path_buf(),
                    source,
                })
            }
        };

        let body = [
            BLOCK_HEADER.to_string(),
            format!("command source {}", session_file.display()),
        ];
        let updated = with_managed_block(&strip_managed_block(&existing), &body);
        if updated == existing {
            return Ok(());
        }
        write_file(global_init, &updated)
    }
}

fn write_file(path: &Path, content: &str) -> DebugPathResult<()> {
    let write_err = |source| DebugPathError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, content).map_err(write_err)
}
