//! Shared helpers for integration tests
//!
//! - archive builders for packaged artifacts
//! - tree hashing for determinism checks
//! - a baseline Xcode build environment rooted in a scratch directory

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;
use xcode_build_bridge::BridgeEnv;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Archive member: `None` content marks a directory record
pub type ZipEntry<'a> = (&'a str, Option<&'a [u8]>, u32);

/// Write a zip archive with the given members
pub fn write_zip(path: &Path, entries: &[ZipEntry<'_>]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, content, mode) in entries {
        let options = FileOptions::default().unix_permissions(*mode);
        match content {
            Some(bytes) => {
                zip.start_file(*name, options).unwrap();
                zip.write_all(bytes).unwrap();
            }
            None => zip.add_directory(*name, options).unwrap(),
        }
    }
    zip.finish().unwrap();
}

/// A small iOS application packaged the way the builder ships it
pub fn write_app_ipa(path: &Path, bundle: &str) {
    let root = format!("Payload/{bundle}/");
    let binary = format!("Payload/{bundle}/App");
    let plist = format!("Payload/{bundle}/Info.plist");
    let framework = format!("Payload/{bundle}/Frameworks/Core.framework/Core");
    write_zip(
        path,
        &[
            ("Payload/", None, 0o755),
            (&root, None, 0o755),
            (&binary, Some(&b"\xcf\xfa\xed\xfe app"[..]), 0o755),
            (&plist, Some(&b"<plist/>"[..]), 0o644),
            (&framework, Some(&b"\xcf\xfa\xed\xfe core"[..]), 0o755),
            (
                "SwiftSupport/iphoneos/libswiftCore.dylib",
                Some(&b"swift"[..]),
                0o644,
            ),
        ],
    );
}

/// SHA-256 over relative paths, file types and contents of a tree
pub fn tree_hash(root: &Path) -> String {
    let mut hasher = Sha256::new();
    for entry in WalkDir::new(root).sort_by_file_name().follow_links(false) {
        let entry = entry.unwrap();
        let relative = entry.path().strip_prefix(root).unwrap();
        hasher.update(relative.to_string_lossy().as_bytes());
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            hasher.update(b"L");
            hasher.update(fs::read_link(entry.path()).unwrap().to_string_lossy().as_bytes());
        } else if file_type.is_dir() {
            hasher.update(b"D");
        } else {
            hasher.update(b"F");
            hasher.update(fs::read(entry.path()).unwrap());
        }
    }
    hex::encode(hasher.finalize())
}

/// Scratch layout of a project, its workspace and Xcode's products
pub struct ProjectLayout {
    pub root: PathBuf,
    pub workspace: PathBuf,
    pub products: PathBuf,
    pub project_dir: PathBuf,
    pub project_file: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: &Path) -> Self {
        let layout = Self {
            root: root.to_path_buf(),
            workspace: root.join("ws"),
            products: root.join("products/Debug-iphoneos"),
            project_dir: root.join("proj"),
            project_file: root.join("proj/App.xcodeproj"),
        };
        fs::create_dir_all(&layout.workspace).unwrap();
        fs::create_dir_all(&layout.products).unwrap();
        fs::create_dir_all(&layout.project_file).unwrap();
        layout
    }

    /// Environment of a device build of `App.app`
    pub fn vars(&self) -> HashMap<String, String> {
        let p = |path: &Path| path.display().to_string();
        [
            ("ACTION", String::new()),
            ("CONFIGURATION", "Debug".to_string()),
            ("PLATFORM_NAME", "iphoneos".to_string()),
            ("CURRENT_ARCH", "arm64".to_string()),
            ("SDK_VERSION", "13.2".to_string()),
            ("PRODUCT_TYPE", "com.apple.product-type.application".to_string()),
            ("PACKAGE_TYPE", "com.apple.package-type.wrapper".to_string()),
            ("TARGET_BUILD_DIR", p(&self.products)),
            ("FULL_PRODUCT_NAME", "App.app".to_string()),
            ("EXECUTABLE_PATH", "App.app/App".to_string()),
            ("WRAPPER_SUFFIX", ".app".to_string()),
            ("WRAPPER_EXTENSION", "app".to_string()),
            ("BUILT_PRODUCTS_DIR", p(&self.products)),
            ("CODESIGNING_FOLDER_PATH", p(&self.products.join("App.app"))),
            ("CODE_SIGNING_ALLOWED", "NO".to_string()),
            ("PROJECT_DIR", p(&self.project_dir)),
            ("PROJECT_FILE_PATH", p(&self.project_file)),
            ("XCODE_VERSION_ACTUAL", "1131".to_string()),
            ("XCODE_VERSION_MINOR", "1130".to_string()),
            ("XCBRIDGE_WORKSPACE_ROOT", p(&self.workspace)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    pub fn env(&self, vars: &HashMap<String, String>) -> BridgeEnv {
        BridgeEnv::from_lookup(|k| vars.get(k).cloned(), self.project_dir.clone()).unwrap()
    }

    /// Create the builder's output tree and the `bazel-bin` link to it
    ///
    /// Returns the build workspace root.
    #[cfg(unix)]
    pub fn make_bin_link(&self) -> PathBuf {
        let build_root = self.root.join("output/execroot/ws");
        let bin = build_root.join("bazel-out/ios-dbg/bin");
        fs::create_dir_all(&bin).unwrap();
        std::os::unix::fs::symlink(&bin, self.workspace.join("bazel-bin")).unwrap();
        build_root
    }

    /// Event logs left in the project support directory
    pub fn leftover_event_logs(&self) -> Vec<PathBuf> {
        match fs::read_dir(self.project_file.join(".xcbridge")) {
            Ok(entries) => entries
                .map(|e| e.unwrap().path())
                .filter(|p| p.to_string_lossy().ends_with("_build_events.json"))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
