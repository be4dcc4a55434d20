//! Build execution and output collection
//!
//! The collector drives the builder process and the event log watcher in a
//! cooperative loop:
//!
//! ```text
//! Running --(exit 0, manifest seen)--> Succeeded
//!    |------(exit 0, no manifest)----> Failed (no manifest)
//!    `------(exit != 0)--------------> Failed (exit code passed through)
//! ```
//!
//! Each iteration polls the process, relays new output from the event log
//! and sleeps for the poll interval. After the process exits the log is
//! drained once more, since the builder may write its last records between
//! the final poll and its exit.

pub mod clock;
pub mod patch;
pub mod process;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use bridge_events::{BuildEvent, EventWatcher};
use thiserror::Error;

use crate::config::BridgeSettings;
use crate::ide;
use crate::summary::ExitCode;

pub use clock::{Clock, ManualClock, SystemClock};
pub use patch::OutputPatcher;
pub use process::{
    BuildProcess, OutputTarget, ProcessError, ProcessHandle, ProcessResult, ProcessRunner,
    ProcessState,
};

/// Terminal collection failures
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("unable to find location of the {suffix} file; please report this, including the contents of {event_log}")]
    NoManifest { suffix: String, event_log: PathBuf },

    #[error("builder build failed with exit code {exit_code}")]
    BuildFailed { exit_code: i32 },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl CollectError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CollectError::NoManifest { .. } => ExitCode::NoManifest.as_i32(),
            CollectError::BuildFailed { exit_code } => *exit_code,
            CollectError::Process(e) => e.exit_code(),
        }
    }
}

/// Result type for collection
pub type CollectResult<T> = Result<T, CollectError>;

/// Collector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Running,
    Succeeded,
    Failed,
}

/// Collector tuning
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub poll_interval: Duration,
    pub manifest_suffix: String,
}

impl CollectorConfig {
    pub fn from_settings(settings: &BridgeSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            manifest_suffix: settings.manifest_suffix.clone(),
        }
    }
}

/// Outcome of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected {
    /// Manifest paths in the order first reported
    pub manifests: Vec<PathBuf>,
    pub events: u64,
    pub malformed: u64,
}

/// Drives the builder and relays its output
pub struct OutputCollector<C: Clock> {
    config: CollectorConfig,
    clock: C,
    patcher: OutputPatcher,
    state: CollectorState,
    manifests: Vec<PathBuf>,
    malformed: u64,
}

impl<C: Clock> OutputCollector<C> {
    pub fn new(config: CollectorConfig, clock: C, patcher: OutputPatcher) -> Self {
        Self {
            config,
            clock,
            patcher,
            state: CollectorState::Running,
            manifests: Vec::new(),
            malformed: 0,
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Manifest paths seen so far
    pub fn manifests(&self) -> &[PathBuf] {
        &self.manifests
    }

    /// Run until the process exits
    pub fn collect<P, W>(
        &mut self,
        process: &mut P,
        watcher: &mut EventWatcher,
        out: &mut W,
    ) -> CollectResult<Collected>
    where
        P: BuildProcess,
        W: Write,
    {
        loop {
            let state = match process.poll() {
                Ok(state) => state,
                Err(e) => {
                    self.drain(watcher, out);
                    self.state = CollectorState::Failed;
                    return Err(e.into());
                }
            };

            self.drain(watcher, out);

            match state {
                ProcessState::Running => self.clock.sleep(self.config.poll_interval),
                ProcessState::Exited(code) => {
                    self.drain(watcher, out);
                    return self.finish(code, watcher);
                }
            }
        }
    }

    fn finish(&mut self, code: i32, watcher: &EventWatcher) -> CollectResult<Collected> {
        tracing::info!(
            exit_code = code,
            events = watcher.total_events(),
            manifests = self.manifests.len(),
            "builder exited"
        );

        if code != 0 {
            self.state = CollectorState::Failed;
            return Err(CollectError::BuildFailed { exit_code: code });
        }

        if self.manifests.is_empty() {
            self.state = CollectorState::Failed;
            return Err(CollectError::NoManifest {
                suffix: self.config.manifest_suffix.clone(),
                event_log: watcher.path().to_path_buf(),
            });
        }

        self.state = CollectorState::Succeeded;
        Ok(Collected {
            manifests: self.manifests.clone(),
            events: watcher.total_events(),
            malformed: self.malformed,
        })
    }

    /// Relay everything currently complete in the event log
    fn drain<W: Write>(&mut self, watcher: &mut EventWatcher, out: &mut W) {
        match watcher.poll() {
            Ok(events) => {
                for event in &events {
                    self.relay(event, out);
                }
            }
            Err(e) => {
                tracing::warn!(path = %watcher.path().display(), "failed to read event log: {e}");
            }
        }

        for err in watcher.take_malformed() {
            self.malformed += 1;
            let line = ide::format_warning(&format!("skipped malformed build event: {err}"));
            write_line(out, &line);
        }
    }

    fn relay<W: Write>(&mut self, event: &BuildEvent, out: &mut W) {
        for text in [&event.stderr, &event.stdout].into_iter().flatten() {
            for line in self.patcher.patch_block(text) {
                write_line(out, &line);
            }
        }

        for path in event.files_with_suffix(&self.config.manifest_suffix) {
            let path = PathBuf::from(path);
            if !self.manifests.contains(&path) {
                tracing::debug!(manifest = %path.display(), "manifest reported");
                self.manifests.push(path);
            }
        }
    }
}

fn write_line<W: Write>(out: &mut W, line: &str) {
    if writeln!(out, "{line}").and_then(|_| out.flush()).is_err() {
        tracing::debug!("dropped output line: {line}");
    }
}
