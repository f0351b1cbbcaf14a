//! Executable resolver integration tests against real directory trees.

use cildev::resolver::{executable_name, executable_path};
use std::fs;
use tempfile::tempdir;

fn touch(path: &std::path::Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

#[test]
fn test_only_multi_config_present() {
    let build = tempdir().unwrap();
    let multi = build.path().join("Release").join(executable_name("HelloWorld"));
    touch(&multi);

    assert_eq!(executable_path(build.path(), "Release", "HelloWorld"), multi);
}

#[test]
fn test_only_single_config_present() {
    let build = tempdir().unwrap();
    let single = build.path().join(executable_name("HelloWorld"));
    touch(&single);

    assert_eq!(executable_path(build.path(), "Release", "HelloWorld"), single);
}

#[test]
fn test_both_present_multi_config_takes_precedence() {
    let build = tempdir().unwrap();
    let multi = build.path().join("Debug").join(executable_name("HelloWorld"));
    let single = build.path().join(executable_name("HelloWorld"));
    touch(&multi);
    touch(&single);

    assert_eq!(executable_path(build.path(), "Debug", "HelloWorld"), multi);
}

#[test]
fn test_neither_present_returns_conventional_location() {
    let build = tempdir().unwrap();
    let resolved = executable_path(build.path(), "Release", "HelloWorld");
    assert_eq!(
        resolved,
        build
            .path()
            .join("Release")
            .join(executable_name("HelloWorld"))
    );
}

#[test]
fn test_configurations_resolve_independently() {
    let build = tempdir().unwrap();
    let debug = build.path().join("Debug").join(executable_name("app"));
    touch(&debug);

    // Debug binary exists, Release does not; Release falls through to the
    // conventional multi-config path.
    assert_eq!(executable_path(build.path(), "Debug", "app"), debug);
    assert_eq!(
        executable_path(build.path(), "Release", "app"),
        build.path().join("Release").join(executable_name("app"))
    );
}
