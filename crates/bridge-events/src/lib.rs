//! Build event log support for the Xcode build bridge
//!
//! The external builder appends one JSON record per line to an event log
//! while it runs. This crate decodes those records into [`BuildEvent`]s and
//! provides [`EventWatcher`], which reads the log incrementally without ever
//! emitting a record before its terminating newline has been written.

pub mod event;
pub mod watcher;

pub use event::{BuildEvent, EventError, EventResult};
pub use watcher::{EventCursor, EventWatcher};
