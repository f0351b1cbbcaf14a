//! Ephemeral workspace for one pipeline run.
//!
//! Every integration run owns a uniquely named temporary directory; all
//! phase-specific output and build directories nest under it. The directory
//! is removed exactly once at run end unless retention was requested, and a
//! failed removal is only a warning, never a run failure.

use crate::console::Console;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of the workspace directory name under the system temp root.
pub const WORKSPACE_PREFIX: &str = "cil2cpp_integration_";

pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    retain: bool,
}

impl Workspace {
    /// Allocate a fresh workspace. Allocation failure is fatal to the run.
    pub fn allocate(retain: bool) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .context("failed to allocate workspace directory")?;
        let path = dir.path().to_path_buf();
        Ok(Self {
            dir: Some(dir),
            path,
            retain,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retained(&self) -> bool {
        self.retain
    }

    /// Path of a phase-specific subdirectory. Not created here; steps and
    /// the tools they invoke create it strictly before use.
    pub fn subdir(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Release the workspace: keep it on disk when retention was requested,
    /// otherwise delete it, downgrading deletion errors to a warning.
    pub fn finish(mut self, console: &Console) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.retain {
            let kept = dir.keep();
            console.line(&format!("  Keeping temp directory: {}", kept.display()));
        } else {
            match dir.close() {
                Ok(()) => console.line("  Cleaned up temp directory"),
                Err(e) => console.warn(&format!(
                    "  Warning: could not clean up {}: {}",
                    self.path.display(),
                    e
                )),
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_workspace_path_exists_and_is_unique() {
        let a = Workspace::allocate(false).unwrap();
        let b = Workspace::allocate(false).unwrap();
        assert!(a.path().exists());
        assert!(b.path().exists());
        assert_ne!(a.path(), b.path());
        a.finish(&Console::plain());
        b.finish(&Console::plain());
    }

    #[test]
    fn test_workspace_name_carries_prefix() {
        let ws = Workspace::allocate(false).unwrap();
        let name = ws.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(WORKSPACE_PREFIX));
        ws.finish(&Console::plain());
    }

    #[test]
    fn test_finish_removes_non_retained_workspace() {
        let ws = Workspace::allocate(false).unwrap();
        let path = ws.path().to_path_buf();
        fs::write(path.join("artifact.txt"), b"x").unwrap();
        ws.finish(&Console::plain());
        assert!(!path.exists());
    }

    #[test]
    fn test_finish_keeps_retained_workspace() {
        let ws = Workspace::allocate(true).unwrap();
        let path = ws.path().to_path_buf();
        fs::write(path.join("artifact.txt"), b"x").unwrap();
        ws.finish(&Console::plain());
        assert!(path.exists());
        assert!(path.join("artifact.txt").exists());
        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn test_subdir_nests_under_workspace() {
        let ws = Workspace::allocate(false).unwrap();
        let sub = ws.subdir("helloworld_build");
        assert!(sub.starts_with(ws.path()));
        assert!(!sub.exists());
        ws.finish(&Console::plain());
    }
}
