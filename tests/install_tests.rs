//! Artifact installation tests
//!
//! Packaged archives are unpacked into the bundle Xcode expects, with the
//! container directory and support directories stripped.

mod fixtures;

use std::fs;
use std::path::{Path, PathBuf};

use bridge_layout::{PackageType, Platform, ProductType};
use fixtures::{tree_hash, write_app_ipa, write_zip};
use tempfile::TempDir;
use xcode_build_bridge::artifact::{ArtifactInstaller, ArtifactManifest, BundleTarget, InstallKind};

fn app_target() -> BundleTarget {
    BundleTarget {
        product_type: ProductType::from_identifier("com.apple.product-type.application"),
        package_type: Some(PackageType::from_identifier("com.apple.package-type.wrapper")),
        platform: Platform::new("iphoneos"),
        wrapper_suffix: ".app".to_string(),
    }
}

fn manifest(json: &str) -> ArtifactManifest {
    ArtifactManifest::parse(json, Path::new("App.manifest")).unwrap()
}

#[test]
fn test_ipa_payload_is_stripped() {
    let dir = TempDir::new().unwrap();
    write_app_ipa(&dir.path().join("out/App.ipa"), "App.app");
    let dest = dir.path().join("products/App.app");

    let installer = ArtifactInstaller::new(app_target(), dir.path().to_path_buf());
    let report = installer
        .install(&manifest(r#"{"artifacts":["out/App.ipa"]}"#), &dest)
        .unwrap();

    assert!(report.warnings.is_empty());
    assert!(dest.join("App").is_file());
    assert!(dest.join("Info.plist").is_file());
    assert!(dest.join("Frameworks/Core.framework/Core").is_file());
    assert!(!dest.join("Payload").exists());
    assert!(!dest.join("iphoneos").exists());
    match report.kind {
        InstallKind::Unpacked(summary) => {
            assert_eq!(summary.files, 3);
            // Payload/ and SwiftSupport/...
            assert_eq!(summary.skipped, 2);
        }
        other => panic!("expected unpack, got {other:?}"),
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(dest.join("App")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

#[test]
fn test_reinstall_is_deterministic() {
    let dir = TempDir::new().unwrap();
    write_app_ipa(&dir.path().join("out/App.ipa"), "App.app");
    let dest = dir.path().join("products/App.app");
    let installer = ArtifactInstaller::new(app_target(), dir.path().to_path_buf());
    let m = manifest(r#"{"artifacts":["out/App.ipa"]}"#);

    installer.install(&m, &dest).unwrap();
    let first = tree_hash(&dest);
    fs::write(dest.join("stale.txt"), b"left over").unwrap();
    installer.install(&m, &dest).unwrap();
    let second = tree_hash(&dest);

    assert_eq!(first, second);
    assert!(!dest.join("stale.txt").exists());
}

#[test]
fn test_manifest_bundle_name_overrides_artifact_name() {
    let dir = TempDir::new().unwrap();
    write_app_ipa(&dir.path().join("out/app_bin.ipa"), "Renamed.app");
    let dest = dir.path().join("products/App.app");

    let installer = ArtifactInstaller::new(app_target(), dir.path().to_path_buf());
    let report = installer
        .install(
            &manifest(r#"{"artifacts":["out/app_bin.ipa"],"bundle_name":"Renamed"}"#),
            &dest,
        )
        .unwrap();

    assert!(report.warnings.is_empty());
    assert!(dest.join("App").is_file());
}

#[test]
fn test_extension_archive_uses_plugins_subpath() {
    let dir = TempDir::new().unwrap();
    write_zip(
        &dir.path().join("out/Share.ipa"),
        &[
            ("PlugIns/", None, 0o755),
            ("PlugIns/Share.appex/", None, 0o755),
            ("PlugIns/Share.appex/Share", Some(&b"ext"[..]), 0o755),
            ("PlugIns/Share.appex/Info.plist", Some(&b"<plist/>"[..]), 0o644),
        ],
    );
    let target = BundleTarget {
        product_type: ProductType::from_identifier("com.apple.product-type.app-extension"),
        package_type: Some(PackageType::from_identifier(
            "com.apple.package-type.app-extension",
        )),
        platform: Platform::new("iphoneos"),
        wrapper_suffix: ".appex".to_string(),
    };
    let dest = dir.path().join("products/Share.appex");

    let report = ArtifactInstaller::new(target, dir.path().to_path_buf())
        .install(&manifest(r#"{"artifacts":["out/Share.ipa"]}"#), &dest)
        .unwrap();

    assert!(report.warnings.is_empty());
    assert!(dest.join("Share").is_file());
    assert!(dest.join("Info.plist").is_file());
}

#[test]
fn test_unexpected_subpath_is_extracted_with_warning() {
    let dir = TempDir::new().unwrap();
    write_zip(
        &dir.path().join("out/Tool.zip"),
        &[
            ("Other.app/", None, 0o755),
            ("Other.app/Tool", Some(&b"bin"[..]), 0o755),
        ],
    );
    let target = BundleTarget {
        platform: Platform::new("macosx"),
        ..app_target()
    };
    let dest = dir.path().join("products/Tool.app");

    let report = ArtifactInstaller::new(target, dir.path().to_path_buf())
        .install(&manifest(r#"{"artifacts":["out/Tool.zip"]}"#), &dest)
        .unwrap();

    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings[0].contains("expected to have subpath of \"Tool.app\""));
    assert!(dest.join("Tool").is_file());
}

#[test]
fn test_missing_archive_and_corrupt_archive_codes() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("products/App.app");
    let installer = ArtifactInstaller::new(app_target(), dir.path().to_path_buf());

    let err = installer
        .install(&manifest(r#"{"artifacts":["out/Missing.ipa"]}"#), &dest)
        .unwrap_err();
    assert_eq!(err.exit_code(), 670);

    let corrupt = dir.path().join("out/Corrupt.ipa");
    fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
    fs::write(&corrupt, b"not a zip archive").unwrap();
    let err = installer
        .install(&manifest(r#"{"artifacts":["out/Corrupt.ipa"]}"#), &dest)
        .unwrap_err();
    assert_eq!(err.exit_code(), 671);
}

#[test]
fn test_unreadable_manifest_code() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("App.manifest");
    fs::write(&path, b"{ not json").unwrap();
    let err = ArtifactManifest::load(&path).unwrap_err();
    assert_eq!(err.exit_code(), 601);

    let err = ArtifactManifest::load(&PathBuf::from("/nonexistent/App.manifest")).unwrap_err();
    assert_eq!(err.exit_code(), 601);
}
