//! Archive entry classification
//!
//! Decides, for one archive member name, whether it is extracted and where
//! it lands relative to the install destination.

use std::path::PathBuf;

use crate::layout::BundleLayout;

/// Why an archive entry was not extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Lives under a `*Support`/`*Support2` top directory
    SupportDirectory,
    /// Name is shorter than the expected subpath (a container directory)
    ShorterThanSubpath,
    /// Name escapes the destination via `..` or is absolute
    UnsafePath,
}

/// What to do with an archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDisposition {
    Skip(SkipReason),
    Extract {
        /// Path relative to the install destination; empty for the root
        relative: PathBuf,
        /// Entry is a directory record
        is_dir: bool,
        /// Entry does not start with the expected subpath
        mismatched: bool,
    },
}

/// Classify an archive member name against the expected layout
pub fn classify_entry(name: &str, layout: &BundleLayout) -> EntryDisposition {
    let top = name.split('/').next().unwrap_or("");
    if top.ends_with("Support") || top.ends_with("Support2") {
        return EntryDisposition::Skip(SkipReason::SupportDirectory);
    }

    if name.len() < layout.subpath.len() {
        return EntryDisposition::Skip(SkipReason::ShorterThanSubpath);
    }

    if name.starts_with('/') || name.split('/').any(|c| c == "..") {
        return EntryDisposition::Skip(SkipReason::UnsafePath);
    }

    let relative: PathBuf = name
        .split('/')
        .skip(layout.strip_components)
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();

    EntryDisposition::Extract {
        relative,
        is_dir: name.ends_with('/'),
        mismatched: !name.starts_with(&layout.subpath),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::BundleContainer;

    fn payload_layout() -> BundleLayout {
        BundleLayout {
            subpath: "Payload/App.app".to_string(),
            strip_components: 2,
            container: BundleContainer::Payload,
        }
    }

    #[test]
    fn test_payload_entry_is_remapped() {
        let d = classify_entry("Payload/App.app/Frameworks/A.framework/A", &payload_layout());
        assert_eq!(
            d,
            EntryDisposition::Extract {
                relative: PathBuf::from("Frameworks/A.framework/A"),
                is_dir: false,
                mismatched: false,
            }
        );
    }

    #[test]
    fn test_bundle_root_directory_maps_to_destination() {
        let d = classify_entry("Payload/App.app/", &payload_layout());
        assert_eq!(
            d,
            EntryDisposition::Extract {
                relative: PathBuf::new(),
                is_dir: true,
                mismatched: false,
            }
        );
    }

    #[test]
    fn test_support_directories_are_skipped() {
        let layout = payload_layout();
        assert_eq!(
            classify_entry("SwiftSupport/iphoneos/libswiftCore.dylib", &layout),
            EntryDisposition::Skip(SkipReason::SupportDirectory)
        );
        assert_eq!(
            classify_entry("WatchKitSupport2/WK", &layout),
            EntryDisposition::Skip(SkipReason::SupportDirectory)
        );
    }

    #[test]
    fn test_container_directory_is_skipped() {
        assert_eq!(
            classify_entry("Payload/", &payload_layout()),
            EntryDisposition::Skip(SkipReason::ShorterThanSubpath)
        );
    }

    #[test]
    fn test_mismatched_entry_is_still_extracted() {
        let d = classify_entry("Payload/Other.app/Info.plist", &payload_layout());
        assert_eq!(
            d,
            EntryDisposition::Extract {
                relative: PathBuf::from("Info.plist"),
                is_dir: false,
                mismatched: true,
            }
        );
    }

    #[test]
    fn test_parent_components_are_rejected() {
        assert_eq!(
            classify_entry("Payload/App.app/../../../etc/passwd", &payload_layout()),
            EntryDisposition::Skip(SkipReason::UnsafePath)
        );
    }

    #[test]
    fn test_zip_layout_strips_one_component() {
        let layout = BundleLayout {
            subpath: "Foo.app".to_string(),
            strip_components: 1,
            container: BundleContainer::TopLevel,
        };
        let d = classify_entry("Foo.app/Foo", &layout);
        assert_eq!(
            d,
            EntryDisposition::Extract {
                relative: PathBuf::from("Foo"),
                is_dir: false,
                mismatched: false,
            }
        );
    }
}
