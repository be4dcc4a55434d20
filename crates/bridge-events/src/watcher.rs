//! Incremental event log watcher
//!
//! The builder writes the event log from another process while the bridge
//! reads it. The watcher keeps a cursor into the file and hands out only
//! complete, newline-terminated records:
//!
//! - bytes after the last newline are buffered and retried on the next poll
//! - a record that fails to decode is skipped with a warning; the cursor still
//!   moves past it so one bad line never stalls the watch loop
//! - a log that does not exist yet, or exists but is empty, yields no events
//!
//! Polling never blocks. The file is only ever appended to by the builder, so
//! no locking is needed.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::event::{BuildEvent, EventError, EventResult};

/// Read position into an event log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCursor {
    /// Bytes read from the file so far
    offset: u64,

    /// Unterminated trailing bytes waiting for their newline
    pending: Vec<u8>,
}

impl EventCursor {
    /// Total bytes read from the log
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Offset just past the last complete record
    pub fn committed(&self) -> u64 {
        self.offset - self.pending.len() as u64
    }

    /// Bytes of a partial record buffered for the next poll
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

/// Watches a growing event log and decodes new records on demand
#[derive(Debug)]
pub struct EventWatcher {
    /// Path to the event log
    path: PathBuf,

    /// Open handle, created lazily once the log exists
    file: Option<File>,

    /// Read position
    cursor: EventCursor,

    /// Records that failed to decode since the last `take_malformed`
    malformed: Vec<EventError>,

    /// Total events emitted
    total_events: u64,

    /// Total records skipped as malformed
    skipped_records: u64,
}

impl EventWatcher {
    /// Create a watcher positioned at the start of the log
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            cursor: EventCursor::default(),
            malformed: Vec::new(),
            total_events: 0,
            skipped_records: 0,
        }
    }

    /// Path of the watched log
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current read position
    pub fn cursor(&self) -> &EventCursor {
        &self.cursor
    }

    /// Total events emitted so far
    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    /// Total records skipped as malformed
    pub fn skipped_records(&self) -> u64 {
        self.skipped_records
    }

    /// Drain the decode failures recorded since the last call
    pub fn take_malformed(&mut self) -> Vec<EventError> {
        std::mem::take(&mut self.malformed)
    }

    /// Return every complete record appended since the last poll
    ///
    /// Returns an empty vector when nothing new has been written. I/O errors
    /// are returned to the caller; decode failures are not (see
    /// [`take_malformed`](Self::take_malformed)).
    pub fn poll(&mut self) -> EventResult<Vec<BuildEvent>> {
        let read = self.read_new_bytes()?;
        if read == 0 {
            return Ok(Vec::new());
        }

        let base = self.cursor.committed();
        let mut events = Vec::new();
        let mut start = 0usize;

        while let Some(pos) = self.cursor.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            let line_offset = base + start as u64;
            let line = String::from_utf8_lossy(&self.cursor.pending[start..end]);
            let record = line.trim();

            if !record.is_empty() {
                match BuildEvent::decode(record, line_offset) {
                    Ok(event) => events.push(event),
                    Err(err) => {
                        tracing::warn!(path = %self.path.display(), "skipping event record: {err}");
                        self.skipped_records += 1;
                        self.malformed.push(err);
                    }
                }
            }

            start = end + 1;
        }

        self.cursor.pending.drain(..start);
        self.total_events += events.len() as u64;
        Ok(events)
    }

    /// Append any new bytes to the pending buffer, returning how many were read
    fn read_new_bytes(&mut self) -> io::Result<usize> {
        if self.file.is_none() {
            match File::open(&self.path) {
                Ok(mut file) => {
                    file.seek(SeekFrom::Start(self.cursor.offset))?;
                    self.file = Some(file);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
                Err(e) => return Err(e),
            }
        }

        let Some(file) = self.file.as_mut() else {
            return Ok(0);
        };

        let read = file.read_to_end(&mut self.cursor.pending)?;
        self.cursor.offset += read as u64;
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    #[test]
    fn test_missing_log_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let mut watcher = EventWatcher::new(dir.path().join("events.json"));

        assert!(watcher.poll().unwrap().is_empty());
        assert_eq!(watcher.cursor().offset(), 0);
    }

    #[test]
    fn test_empty_log_then_growth() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        File::create(&path).unwrap();

        let mut watcher = EventWatcher::new(&path);
        assert!(watcher.poll().unwrap().is_empty());

        append(&path, "{\"stdout\":\"one\"}\n");
        let events = watcher.poll().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stdout.as_deref(), Some("one"));
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");

        let mut watcher = EventWatcher::new(&path);
        append(&path, "{\"stdout\":\"par");
        assert!(watcher.poll().unwrap().is_empty());
        assert_eq!(watcher.cursor().committed(), 0);
        assert!(!watcher.cursor().pending().is_empty());

        append(&path, "tial\"}");
        assert!(watcher.poll().unwrap().is_empty());

        append(&path, "\n");
        let events = watcher.poll().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stdout.as_deref(), Some("partial"));
        assert!(watcher.cursor().pending().is_empty());
        assert_eq!(watcher.cursor().committed(), watcher.cursor().offset());
    }

    #[test]
    fn test_records_are_never_reemitted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        let mut watcher = EventWatcher::new(&path);

        let mut seen = Vec::new();
        for i in 0..5 {
            append(&path, &format!("{{\"stdout\":\"line {i}\"}}\n"));
            let before = watcher.cursor().committed();
            for event in watcher.poll().unwrap() {
                seen.push(event.stdout.unwrap());
            }
            assert!(watcher.cursor().committed() > before);
            assert!(watcher.poll().unwrap().is_empty());
        }

        let expected: Vec<String> = (0..5).map(|i| format!("line {i}")).collect();
        assert_eq!(seen, expected);
        assert_eq!(watcher.total_events(), 5);
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        append(
            &path,
            "{\"stdout\":\"a\"}\n{broken\n\n{\"files\":[\"/tmp/out.manifest\"]}\n",
        );

        let mut watcher = EventWatcher::new(&path);
        let events = watcher.poll().unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].files, vec!["/tmp/out.manifest"]);
        assert_eq!(watcher.skipped_records(), 1);

        let malformed = watcher.take_malformed();
        assert_eq!(malformed.len(), 1);
        assert!(matches!(malformed[0], EventError::Malformed { offset: 15, .. }));
        assert!(watcher.take_malformed().is_empty());
        assert_eq!(watcher.cursor().committed(), watcher.cursor().offset());
    }

    #[test]
    fn test_crlf_terminated_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        append(&path, "{\"stderr\":\"warn\"}\r\n");

        let mut watcher = EventWatcher::new(&path);
        let events = watcher.poll().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stderr.as_deref(), Some("warn"));
    }

    #[test]
    fn test_log_created_after_first_poll() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.json");
        let mut watcher = EventWatcher::new(&path);

        assert!(watcher.poll().unwrap().is_empty());
        append(&path, "{\"files\":[\"/x.manifest\"]}\n");
        assert_eq!(watcher.poll().unwrap().len(), 1);
    }
}
