//! External builder process
//!
//! The builder's own stdout and stderr are not read: all user-visible output
//! arrives through the event log. They are discarded, or redirected to a file
//! for debugging.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use thiserror::Error;

use crate::config::BuildCommand;
use crate::summary::ExitCode;

/// Errors from process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open output file {path}: {source}")]
    OutputFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to query builder status: {0}")]
    Wait(#[source] io::Error),
}

impl ProcessError {
    pub fn exit_code(&self) -> i32 {
        ExitCode::BuilderLaunch.as_i32()
    }
}

/// Result type for process operations
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Observed state of the builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited(i32),
}

/// A running build that can be polled without blocking
pub trait BuildProcess {
    fn poll(&mut self) -> ProcessResult<ProcessState>;
}

/// Where the builder's own output goes
#[derive(Debug, Clone, Default)]
pub enum OutputTarget {
    #[default]
    Discard,
    /// stdout and stderr appended to one file
    File(PathBuf),
}

/// Launches builder processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    output: OutputTarget,
    working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new(output: OutputTarget) -> Self {
        Self {
            output,
            working_dir: None,
        }
    }

    /// Run the builder from a specific directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Start the builder
    pub fn start(&self, command: &BuildCommand) -> ProcessResult<ProcessHandle> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).stdin(Stdio::null());

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        match &self.output {
            OutputTarget::Discard => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
            OutputTarget::File(path) => {
                let open_err = |source| ProcessError::OutputFile {
                    path: path.clone(),
                    source,
                };
                let file = File::options()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(open_err)?;
                let err_file = file.try_clone().map_err(open_err)?;
                cmd.stdout(file).stderr(err_file);
            }
        }

        tracing::info!("running {}", command.display());

        let child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
            program: command.program.clone(),
            source,
        })?;

        tracing::debug!(pid = child.id(), "builder started");
        Ok(ProcessHandle { child })
    }
}

/// Handle to a started builder
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl BuildProcess for ProcessHandle {
    fn poll(&mut self) -> ProcessResult<ProcessState> {
        match self.child.try_wait().map_err(ProcessError::Wait)? {
            Some(status) => Ok(ProcessState::Exited(exit_code(status))),
            None => Ok(ProcessState::Running),
        }
    }
}

/// Map an exit status to a code; signals become 128 + signal
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
