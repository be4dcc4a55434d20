//! Build event records
//!
//! A record is a single JSON object. Two shapes are accepted and may be mixed
//! within one log:
//!
//! - flat: `{"stdout": "...", "stderr": "...", "files": ["/path", ...]}`
//! - nested, as written by the builder's own event protocol:
//!   `{"progress": {"stdout": "...", "stderr": "..."}}` and
//!   `{"namedSetOfFiles": {"files": [{"name": "...", "uri": "file:///..."}]}}`
//!
//! Unknown keys are ignored so newer builders do not break the watcher.

use serde::Deserialize;
use thiserror::Error;

/// URI scheme prefix stripped from file references
const FILE_URI_PREFIX: &str = "file://";

/// Errors from decoding a single event record
#[derive(Debug, Error)]
pub enum EventError {
    #[error("malformed event record at byte {offset}: {reason}")]
    Malformed { offset: u64, reason: String },

    #[error("event record at byte {offset} is not a JSON object")]
    NotAnObject { offset: u64 },

    #[error("I/O error reading event log: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for event operations
pub type EventResult<T> = Result<T, EventError>;

/// One unit from the event stream
///
/// Constructed per decoded record and consumed immediately by the output
/// collector; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEvent {
    /// Builder stdout carried by this record
    pub stdout: Option<String>,

    /// Builder stderr carried by this record
    pub stderr: Option<String>,

    /// Output file paths announced by this record
    pub files: Vec<String>,
}

impl BuildEvent {
    /// Decode a single log line
    ///
    /// `offset` is the byte position of the line in the log and is only used
    /// for diagnostics.
    pub fn decode(line: &str, offset: u64) -> EventResult<Self> {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| EventError::Malformed {
                offset,
                reason: e.to_string(),
            })?;

        if !value.is_object() {
            return Err(EventError::NotAnObject { offset });
        }

        let raw: RawRecord = serde_json::from_value(value).map_err(|e| EventError::Malformed {
            offset,
            reason: e.to_string(),
        })?;

        Ok(raw.into_event())
    }

    /// True if the record carried nothing the collector cares about
    pub fn is_empty(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none() && self.files.is_empty()
    }

    /// Output files whose path ends with the given suffix
    pub fn files_with_suffix<'a>(&'a self, suffix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.files
            .iter()
            .map(String::as_str)
            .filter(move |f| f.ends_with(suffix))
    }
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    progress: Option<RawProgress>,
    #[serde(default, rename = "namedSetOfFiles")]
    named_set_of_files: Option<RawFileSet>,
}

#[derive(Debug, Deserialize)]
struct RawProgress {
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFileSet {
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    uri: Option<String>,
}

impl RawRecord {
    fn into_event(self) -> BuildEvent {
        let (progress_stdout, progress_stderr) = match self.progress {
            Some(p) => (p.stdout, p.stderr),
            None => (None, None),
        };

        let mut files = self.files;
        if let Some(set) = self.named_set_of_files {
            files.extend(set.files.into_iter().filter_map(RawFile::into_path));
        }

        BuildEvent {
            stdout: non_empty(self.stdout.or(progress_stdout)),
            stderr: non_empty(self.stderr.or(progress_stderr)),
            files,
        }
    }
}

impl RawFile {
    fn into_path(self) -> Option<String> {
        match self.uri {
            Some(uri) => Some(match uri.strip_prefix(FILE_URI_PREFIX) {
                Some(path) => path.to_string(),
                None => uri,
            }),
            None => self.name,
        }
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.is_empty())
}
