//! Builder output rewriting for Xcode's log parser
//!
//! Xcode treats any `<path>:<line>:` line not followed by `warning` as an
//! error. Builder debug and warning messages use that shape, so they are
//! rewritten to carry an explicit `warning:` tag.

use std::path::PathBuf;

use regex_lite::Regex;

/// Rewrites relayed output lines
#[derive(Debug)]
pub struct OutputPatcher {
    builder_tagged: Regex,
    located: Regex,
    relative_location: Regex,
    main_group_prefix: Option<PathBuf>,
}

impl OutputPatcher {
    /// Create a patcher; `main_group_prefix` is prepended to relative
    /// `file:line:` lines when set
    pub fn new(main_group_prefix: Option<PathBuf>) -> Result<Self, regex_lite::Error> {
        Ok(Self {
            builder_tagged: Regex::new(r"^(?:DEBUG|WARNING|INFO): ([^:]+:\d+:(?:\d+:)?)\s+(.+)$")?,
            located: Regex::new(r"^([^:\s][^:]*:\d+:(?:\d+:)?)\s*(.*)$")?,
            relative_location: Regex::new(r"^[^/][^:]+:\d+:")?,
            main_group_prefix,
        })
    }

    /// Patch a single line (no trailing newline)
    pub fn patch(&self, line: &str) -> String {
        let mut patched = match self.builder_tagged.captures(line) {
            Some(caps) => format!("{} warning: {}", &caps[1], &caps[2]),
            None => self.tag_untagged(line),
        };

        if let Some(prefix) = &self.main_group_prefix {
            if self.relative_location.is_match(&patched) {
                patched = format!("{}/{}", prefix.display(), patched);
            }
        }

        patched
    }

    fn tag_untagged(&self, line: &str) -> String {
        let Some(caps) = self.located.captures(line) else {
            return line.to_string();
        };
        let message = &caps[2];
        let tagged = ["warning:", "error:", "note:"]
            .iter()
            .any(|tag| message.starts_with(tag));
        if tagged {
            line.to_string()
        } else {
            format!("{} warning: {}", &caps[1], message)
        }
    }

    /// Patch every line of a block of output
    pub fn patch_block<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        text.lines().map(move |line| self.patch(line))
    }
}
