//! Signal handling and event log cleanup
//!
//! Xcode may kill the build phase at any time (Stop button, SIGTERM on
//! window close). The event log must not outlive the run in either case:
//!
//! 1. Normal exit paths drop the `EventLogGuard`, which removes the file.
//! 2. SIGINT/SIGTERM/SIGHUP run the `CleanupRegistry` from the `ctrlc`
//!    handler, then exit with code 130.
//!
//! The external builder is never cancelled by the bridge; it exits on its own.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Exit code after a termination signal
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Files to remove when the process is terminated by a signal
#[derive(Debug, Clone, Default)]
pub struct CleanupRegistry {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file for removal
    pub fn register(&self, path: PathBuf) {
        if let Ok(mut paths) = self.paths.lock() {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    /// Forget a file (it has been removed or must be kept)
    pub fn unregister(&self, path: &Path) {
        if let Ok(mut paths) = self.paths.lock() {
            paths.retain(|p| p != path);
        }
    }

    /// Currently registered files
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Remove every registered file; returns how many were removed
    pub fn run(&self) -> usize {
        let drained: Vec<PathBuf> = match self.paths.lock() {
            Ok(mut paths) => paths.drain(..).collect(),
            Err(_) => return 0,
        };

        drained
            .iter()
            .filter(|path| fs::remove_file(path).is_ok())
            .count()
    }
}

/// Termination signal handler
pub struct SignalHandler {
    registry: CleanupRegistry,
    signal_count: Arc<AtomicU8>,
}

impl SignalHandler {
    pub fn new(registry: CleanupRegistry) -> Self {
        Self {
            registry,
            signal_count: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Install the handler for SIGINT, SIGTERM and SIGHUP
    ///
    /// Must be called once at program startup.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let registry = self.registry.clone();
        let count = Arc::clone(&self.signal_count);
        ctrlc::set_handler(move || {
            if count.fetch_add(1, Ordering::SeqCst) > 0 {
                return;
            }
            let removed = registry.run();
            tracing::debug!(removed, "termination signal, cleaned up event log");
            std::process::exit(EXIT_CODE_INTERRUPTED);
        })
    }

    /// Number of signals received so far
    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }
}

/// Owns the event log for one build
///
/// The file is created empty on construction and removed on drop unless
/// `keep` was called.
#[derive(Debug)]
pub struct EventLogGuard {
    path: PathBuf,
    registry: CleanupRegistry,
    armed: bool,
}

impl EventLogGuard {
    /// Create (or truncate) the event log and register it for cleanup
    pub fn create(path: PathBuf, registry: &CleanupRegistry) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        File::create(&path)?;
        registry.register(path.clone());

        Ok(Self {
            path,
            registry: registry.clone(),
            armed: true,
        })
    }

    /// Event log path for a process id
    pub fn path_for(dir: &Path, pid: u32) -> PathBuf {
        dir.join(format!("{pid}_build_events.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leave the file on disk after the run
    pub fn keep(&mut self) {
        self.armed = false;
        self.registry.unregister(&self.path);
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl Drop for EventLogGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.registry.unregister(&self.path);
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::debug!(path = %self.path.display(), "failed to remove event log: {e}");
            }
        }
    }
}
