//! Debugger init file maintenance across builds
//!
//! These run against the default locations under a temporary home, i.e. the
//! files the debugger itself loads at startup.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use xcode_build_bridge::config::{BridgeSettings, DebuggerFiles};
use xcode_build_bridge::debugger::{
    strip_managed_block, DebugPathBridge, SourceMapping, BLOCK_END, BLOCK_START,
};

fn default_files(home: &Path) -> DebuggerFiles {
    BridgeSettings::default().debugger.resolve(home)
}

fn remote_map() -> [SourceMapping; 1] {
    [SourceMapping::new("/remote", "/local")]
}

#[test]
fn test_loaded_init_file_reaches_mappings() {
    let home = TempDir::new().unwrap();
    let lldbinit = home.path().join(".lldbinit");
    fs::write(&lldbinit, "alias a b\n").unwrap();

    let files = default_files(home.path());
    assert_eq!(files.global_init, lldbinit);
    DebugPathBridge::new(files.clone())
        .update(&remote_map(), false)
        .unwrap();

    let init = fs::read_to_string(&lldbinit).unwrap();
    assert!(init.starts_with("alias a b\n"));
    assert!(init.contains(&format!("command source {}\n", files.session_file.display())));

    let session = fs::read_to_string(&files.session_file).unwrap();
    assert!(session.contains("settings set target.source-map \"/remote\" \"/local\"\n"));
}

#[test]
fn test_xcode_specific_init_file_wins() {
    let home = TempDir::new().unwrap();
    let xcode_init = home.path().join(".lldbinit-Xcode");
    fs::write(&xcode_init, "settings set target.inline-breakpoint-strategy always\n").unwrap();
    fs::write(home.path().join(".lldbinit"), "alias a b\n").unwrap();

    let files = default_files(home.path());
    DebugPathBridge::new(files.clone())
        .update(&remote_map(), false)
        .unwrap();

    assert!(fs::read_to_string(&xcode_init)
        .unwrap()
        .contains(&format!("command source {}", files.session_file.display())));
    assert_eq!(
        fs::read_to_string(home.path().join(".lldbinit")).unwrap(),
        "alias a b\n"
    );
}

#[test]
fn test_repeated_builds_are_idempotent_at_default_locations() {
    let home = TempDir::new().unwrap();
    let files = default_files(home.path());
    let bridge = DebugPathBridge::new(files.clone());

    bridge.update(&remote_map(), false).unwrap();
    let init = fs::read_to_string(&files.global_init).unwrap();
    let session = fs::read_to_string(&files.session_file).unwrap();
    bridge.update(&remote_map(), false).unwrap();

    assert_eq!(fs::read_to_string(&files.global_init).unwrap(), init);
    assert_eq!(fs::read_to_string(&files.session_file).unwrap(), session);
    assert_eq!(init.matches(BLOCK_START).count(), 1);
}

#[test]
fn test_user_content_without_trailing_newline_is_restored() {
    let home = TempDir::new().unwrap();
    let lldbinit = home.path().join(".lldbinit");
    fs::write(&lldbinit, "alias a b").unwrap();
    let bridge = DebugPathBridge::new(default_files(home.path()));

    bridge.update(&remote_map(), false).unwrap();
    bridge.update(&remote_map(), true).unwrap();

    let init = fs::read_to_string(&lldbinit).unwrap();
    assert_eq!(strip_managed_block(&init), "alias a b");
}

#[test]
fn test_user_edits_around_block_survive() {
    let home = TempDir::new().unwrap();
    let files = default_files(home.path());
    fs::write(&files.global_init, "settings set target.x86-disassembly-flavor intel\n").unwrap();
    let bridge = DebugPathBridge::new(files.clone());

    bridge.update(&remote_map(), false).unwrap();
    let first = fs::read_to_string(&files.global_init).unwrap();
    fs::write(&files.global_init, format!("{first}breakpoint set -n abort\n")).unwrap();
    bridge.update(&remote_map(), true).unwrap();

    let after = fs::read_to_string(&files.global_init).unwrap();
    assert!(after.starts_with("settings set target.x86-disassembly-flavor intel\n"));
    assert!(after.contains("breakpoint set -n abort\n"));
    assert_eq!(after.matches(BLOCK_START).count(), 1);
    assert_eq!(after.matches(BLOCK_END).count(), 1);

    let session = fs::read_to_string(&files.session_file).unwrap();
    assert!(session.contains("settings clear target.source-map"));
    assert!(!session.contains("settings set target.source-map"));
}

#[test]
fn test_configured_paths_resolve_against_home() {
    let home = TempDir::new().unwrap();
    let settings = BridgeSettings::from_toml_str(
        r#"
[debugger]
global_init_file = "~/lldb/init"
remote_source_prefix = "/private/var/tmp/_bazel/execroot/ws"
"#,
    )
    .unwrap();
    let files = settings.debugger.resolve(home.path());
    assert_eq!(files.global_init, home.path().join("lldb/init"));
    assert_eq!(files.session_file, home.path().join(".lldbinit-xcbridge"));

    let mapping = SourceMapping::new(
        settings.debugger.remote_source_prefix.clone(),
        "/Users/dev/ws",
    );
    DebugPathBridge::new(files.clone())
        .update(&[mapping], false)
        .unwrap();

    let init = fs::read_to_string(home.path().join("lldb/init")).unwrap();
    assert!(init.contains(&format!("command source {}", files.session_file.display())));
    let session = fs::read_to_string(&files.session_file).unwrap();
    assert!(session.contains(
        "settings set target.source-map \"/private/var/tmp/_bazel/execroot/ws\" \"/Users/dev/ws\""
    ));
}
