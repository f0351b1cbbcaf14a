//! Workspace lifecycle integration tests.

use cildev::console::Console;
use cildev::workspace::{Workspace, WORKSPACE_PREFIX};
use std::fs;

#[test]
fn test_non_retained_workspace_is_gone_after_finish() {
    let ws = Workspace::allocate(false).unwrap();
    let path = ws.path().to_path_buf();

    // Populate it the way a pipeline run would.
    fs::create_dir_all(path.join("helloworld_output")).unwrap();
    fs::write(path.join("helloworld_output/HelloWorld.cpp"), b"// gen").unwrap();
    fs::create_dir_all(path.join("helloworld_build/Release")).unwrap();

    assert!(path.exists());
    ws.finish(&Console::plain());
    assert!(!path.exists());
}

#[test]
fn test_retained_workspace_survives_and_is_non_empty() {
    let ws = Workspace::allocate(true).unwrap();
    assert!(ws.retained());
    let path = ws.path().to_path_buf();
    fs::write(path.join("artifact.txt"), b"kept").unwrap();

    ws.finish(&Console::plain());
    assert!(path.exists());
    let entries: Vec<_> = fs::read_dir(&path).unwrap().collect();
    assert!(!entries.is_empty());

    fs::remove_dir_all(&path).unwrap();
}

#[test]
fn test_workspaces_never_collide() {
    let first = Workspace::allocate(false).unwrap();
    let second = Workspace::allocate(false).unwrap();
    assert_ne!(first.path(), second.path());
    first.finish(&Console::plain());
    // The other workspace is untouched by the first one's removal.
    assert!(second.path().exists());
    second.finish(&Console::plain());
}

#[test]
fn test_workspace_directory_name_is_recognizable() {
    let ws = Workspace::allocate(false).unwrap();
    let name = ws
        .path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(name.starts_with(WORKSPACE_PREFIX));
    assert!(name.len() > WORKSPACE_PREFIX.len());
    ws.finish(&Console::plain());
}

#[test]
fn test_phase_subdirs_nest_and_are_removed_with_the_workspace() {
    let ws = Workspace::allocate(false).unwrap();
    let path = ws.path().to_path_buf();
    for sub in ["lib_sample", "lib_output", "lib_build"] {
        let dir = ws.subdir(sub);
        assert!(dir.starts_with(&path));
        fs::create_dir_all(&dir).unwrap();
    }
    ws.finish(&Console::plain());
    assert!(!path.exists());
}
