//! Archive layout decision table
//!
//! Packaged artifacts place the bundle at different depths depending on what
//! was built. The rules below are evaluated top to bottom; the first match
//! decides the container directory the bundle is expected under.
//!
//! | archive | condition                               | expected subpath      |
//! |---------|-----------------------------------------|-----------------------|
//! | zip     | any                                     | `<bundle>`            |
//! | ipa     | app extension package, or watch app v1  | `PlugIns/<bundle>`    |
//! | ipa     | watch companion app (watchapp2)         | `Watch/<bundle>`      |
//! | ipa     | macOS platform                          | `<bundle>`            |
//! | ipa     | anything else                           | `Payload/<bundle>`    |
//!
//! Independently of the subpath, entries of a non-macOS `.ipa` lose their
//! first two path components on extraction; every other archive loses one.

use std::path::Path;

use crate::identifiers::{PackageType, Platform, ProductType};

/// Packaged archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Ipa,
    Zip,
}

impl ArchiveKind {
    /// Classify a primary artifact path by extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ipa") => Some(ArchiveKind::Ipa),
            Some("zip") => Some(ArchiveKind::Zip),
            _ => None,
        }
    }
}

/// Directory a bundle is expected under inside an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleContainer {
    PlugIns,
    Watch,
    Payload,
    TopLevel,
}

impl BundleContainer {
    fn prefix(&self) -> Option<&'static str> {
        match self {
            BundleContainer::PlugIns => Some("PlugIns"),
            BundleContainer::Watch => Some("Watch"),
            BundleContainer::Payload => Some("Payload"),
            BundleContainer::TopLevel => None,
        }
    }
}

/// Inputs to the layout decision
#[derive(Debug, Clone, Copy)]
pub struct LayoutQuery<'a> {
    pub product_type: &'a ProductType,
    pub package_type: Option<&'a PackageType>,
    pub platform: &'a Platform,
    pub archive: ArchiveKind,
}

/// Where the bundle lives in the archive and how entries are remapped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLayout {
    /// Expected archive path prefix of the bundle, `/`-separated
    pub subpath: String,

    /// Leading path components dropped from each entry on extraction
    pub strip_components: usize,

    /// Rule that produced the subpath
    pub container: BundleContainer,
}

struct LayoutRule {
    applies: fn(&LayoutQuery<'_>) -> bool,
    container: BundleContainer,
}

const LAYOUT_RULES: &[LayoutRule] = &[
    LayoutRule {
        applies: is_zip,
        container: BundleContainer::TopLevel,
    },
    LayoutRule {
        applies: is_plugin,
        container: BundleContainer::PlugIns,
    },
    LayoutRule {
        applies: is_watch_companion,
        container: BundleContainer::Watch,
    },
    LayoutRule {
        applies: is_macos,
        container: BundleContainer::TopLevel,
    },
    LayoutRule {
        applies: always,
        container: BundleContainer::Payload,
    },
];

fn is_zip(q: &LayoutQuery<'_>) -> bool {
    q.archive == ArchiveKind::Zip
}

fn is_plugin(q: &LayoutQuery<'_>) -> bool {
    matches!(q.package_type, Some(PackageType::AppExtension))
        || matches!(q.product_type, ProductType::WatchApp)
}

fn is_watch_companion(q: &LayoutQuery<'_>) -> bool {
    q.product_type.is_watch_companion()
}

fn is_macos(q: &LayoutQuery<'_>) -> bool {
    q.platform.is_macos()
}

fn always(_: &LayoutQuery<'_>) -> bool {
    true
}

/// Resolve the expected layout of `bundle_name` inside an archive
pub fn resolve_layout(query: &LayoutQuery<'_>, bundle_name: &str) -> BundleLayout {
    let container = LAYOUT_RULES
        .iter()
        .find(|rule| (rule.applies)(query))
        .map(|rule| rule.container)
        .unwrap_or(BundleContainer::Payload);

    let subpath = match container.prefix() {
        Some(prefix) => format!("{prefix}/{bundle_name}"),
        None => bundle_name.to_string(),
    };

    let strip_components = if query.archive == ArchiveKind::Ipa && !query.platform.is_macos() {
        2
    } else {
        1
    };

    BundleLayout {
        subpath,
        strip_components,
        container,
    }
}

/// Product name derived from the primary artifact: file name minus extension
///
/// The product name configured in the Xcode project may have been altered to
/// disambiguate targets, so the artifact name is the trustworthy source.
pub fn product_name_from_artifact(primary_artifact: &Path) -> String {
    primary_artifact
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Bundle name expected inside an archive
///
/// Uses the manifest's bundle name when present, otherwise the product name
/// derived from the primary artifact. The platform wrapper suffix (e.g.
/// `.app`) is appended in both cases.
pub fn expected_bundle_name(
    manifest_bundle_name: Option<&str>,
    primary_artifact: &Path,
    wrapper_suffix: &str,
) -> String {
    match manifest_bundle_name {
        Some(name) if !name.is_empty() => format!("{name}{wrapper_suffix}"),
        _ => format!("{}{wrapper_suffix}", product_name_from_artifact(primary_artifact)),
    }
}
