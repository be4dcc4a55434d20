//! Bundle layout rules for the Xcode build bridge
//!
//! Pure functions that decide where a built bundle lives inside a packaged
//! archive and how archive entries map onto the path Xcode expects. Nothing
//! here touches the filesystem, so every rule is testable in isolation.

pub mod entry;
pub mod identifiers;
pub mod layout;

pub use entry::{classify_entry, EntryDisposition, SkipReason};
pub use identifiers::{PackageType, Platform, PlatformFamily, ProductType};
pub use layout::{
    expected_bundle_name, product_name_from_artifact, resolve_layout, ArchiveKind,
    BundleContainer, BundleLayout, LayoutQuery,
};
