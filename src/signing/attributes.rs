//! Signing attributes of a signed bundle

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Placeholder reported for every attribute when signing is disabled
pub const SIGNING_DISABLED_PLACEHOLDER: &str = "<CODE_SIGNING_ALLOWED=NO>";

/// Attributes read from `codesign -dvv`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningAttributes {
    /// Leaf signing identity (first `Authority=` line)
    pub authority: Option<String>,
    /// Bundle identifier
    pub identifier: Option<String>,
    pub team_identifier: Option<String>,
}

const AUTHORITY: &str = "Authority";
const IDENTIFIER: &str = "Identifier";
const TEAM_IDENTIFIER: &str = "TeamIdentifier";

impl SigningAttributes {
    /// Parse `codesign -dvv` output
    ///
    /// Only the first line for each attribute counts; codesign lists the
    /// whole certificate chain as repeated `Authority=` lines, leaf first.
    pub fn parse(output: &str) -> Self {
        let mut attrs = Self::default();

        for line in output.lines() {
            if attrs.is_complete() {
                break;
            }
            let slot = if line.starts_with(AUTHORITY) {
                Some((&mut attrs.authority, AUTHORITY.len()))
            } else if line.starts_with(TEAM_IDENTIFIER) {
                Some((&mut attrs.team_identifier, TEAM_IDENTIFIER.len()))
            } else if line.starts_with(IDENTIFIER) {
                Some((&mut attrs.identifier, IDENTIFIER.len()))
            } else {
                None
            };

            if let Some((slot, prefix_len)) = slot {
                if slot.is_none() {
                    *slot = Some(line.get(prefix_len + 1..).unwrap_or("").to_string());
                }
            }
        }

        attrs
    }

    /// Attributes reported when signing is disabled for the build
    pub fn disabled() -> Self {
        Self {
            authority: Some(SIGNING_DISABLED_PLACEHOLDER.to_string()),
            identifier: Some(SIGNING_DISABLED_PLACEHOLDER.to_string()),
            team_identifier: Some(SIGNING_DISABLED_PLACEHOLDER.to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.authority.is_some() && self.identifier.is_some() && self.team_identifier.is_some()
    }

    /// Names of attributes the output did not contain
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.authority.is_none() {
            missing.push(AUTHORITY);
        }
        if self.identifier.is_none() {
            missing.push(IDENTIFIER);
        }
        if self.team_identifier.is_none() {
            missing.push(TEAM_IDENTIFIER);
        }
        missing
    }
}

/// Per-run cache of extracted attributes, keyed by bundle path
#[derive(Debug, Default)]
pub struct AttributeCache {
    entries: HashMap<PathBuf, SigningAttributes>,
}

impl AttributeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bundle: &Path) -> Option<&SigningAttributes> {
        self.entries.get(bundle)
    }

    pub fn insert(&mut self, bundle: PathBuf, attributes: SigningAttributes) {
        self.entries.insert(bundle, attributes);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
