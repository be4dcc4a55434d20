//! Xcode product, package and platform identifiers

use std::fmt;

/// Xcode `PRODUCT_TYPE` values the bridge distinguishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductType {
    Application,
    /// First-generation watch app, packaged like an extension
    WatchApp,
    /// Watch companion app, packaged under `Watch/`
    WatchApp2,
    AppExtension,
    UnitTest,
    UiTest,
    Framework,
    StaticLibrary,
    Other(String),
}

impl ProductType {
    /// Parse an Xcode product type identifier
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier {
            "com.apple.product-type.application" => ProductType::Application,
            "com.apple.product-type.application.watchapp" => ProductType::WatchApp,
            "com.apple.product-type.application.watchapp2" => ProductType::WatchApp2,
            "com.apple.product-type.app-extension" => ProductType::AppExtension,
            "com.apple.product-type.bundle.unit-test" => ProductType::UnitTest,
            "com.apple.product-type.bundle.ui-testing" => ProductType::UiTest,
            "com.apple.product-type.framework" => ProductType::Framework,
            "com.apple.product-type.library.static" => ProductType::StaticLibrary,
            other => ProductType::Other(other.to_string()),
        }
    }

    /// Watch companion binaries carry no sources of their own
    pub fn is_watch_companion(&self) -> bool {
        matches!(self, ProductType::WatchApp2)
    }
}

/// Xcode `PACKAGE_TYPE` values the bridge distinguishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageType {
    AppExtension,
    Wrapper,
    Other(String),
}

impl PackageType {
    /// Parse an Xcode package type identifier
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier {
            "com.apple.package-type.app-extension" => PackageType::AppExtension,
            "com.apple.package-type.wrapper" => PackageType::Wrapper,
            other => PackageType::Other(other.to_string()),
        }
    }
}

/// Platform family derived from `PLATFORM_NAME`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    Ios,
    MacOs,
    WatchOs,
    TvOs,
    Unknown,
}

impl PlatformFamily {
    /// Builder configuration name for this family (unknown builds as iOS)
    pub fn config_name(&self) -> &'static str {
        match self {
            PlatformFamily::Ios | PlatformFamily::Unknown => "ios",
            PlatformFamily::MacOs => "darwin",
            PlatformFamily::WatchOs => "watchos",
            PlatformFamily::TvOs => "tvos",
        }
    }

    /// Builder flag carrying the SDK version for this family
    pub fn sdk_version_flag(&self) -> &'static str {
        match self {
            PlatformFamily::Ios | PlatformFamily::Unknown => "--ios_sdk_version",
            PlatformFamily::MacOs => "--macos_sdk_version",
            PlatformFamily::WatchOs => "--watchos_sdk_version",
            PlatformFamily::TvOs => "--tvos_sdk_version",
        }
    }
}

/// Target platform, e.g. `iphoneos` or `watchsimulator`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    name: String,
}

impl Platform {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> PlatformFamily {
        let name = self.name.as_str();
        if name.starts_with("watch") {
            PlatformFamily::WatchOs
        } else if name.starts_with("iphone") {
            PlatformFamily::Ios
        } else if name.starts_with("macos") {
            PlatformFamily::MacOs
        } else if name.starts_with("appletv") {
            PlatformFamily::TvOs
        } else {
            PlatformFamily::Unknown
        }
    }

    pub fn is_macos(&self) -> bool {
        self.family() == PlatformFamily::MacOs
    }

    pub fn is_simulator(&self) -> bool {
        self.name.ends_with("simulator")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
