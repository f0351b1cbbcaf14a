//! Build-output executable resolution.
//!
//! CMake generators disagree about where binaries land: IDE generators
//! (Visual Studio, Xcode) place them in a per-configuration subdirectory,
//! single-configuration generators (Ninja, Makefiles) place them at the
//! build root. Probe the multi-configuration layout first, then the
//! single-configuration one.

use std::path::{Path, PathBuf};

/// Logical executable name with the platform suffix applied.
pub fn executable_name(name: &str) -> String {
    format!("{name}{}", std::env::consts::EXE_SUFFIX)
}

/// Resolve the path of a built executable under `build_dir`.
///
/// If neither layout has the file yet, the multi-configuration path is
/// returned anyway so downstream error messages point at the conventionally
/// expected location.
pub fn executable_path(build_dir: &Path, config: &str, name: &str) -> PathBuf {
    let file_name = executable_name(name);
    let multi = build_dir.join(config).join(&file_name);
    if multi.exists() {
        return multi;
    }
    let single = build_dir.join(&file_name);
    if single.exists() {
        return single;
    }
    multi
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_executable_name_has_platform_suffix() {
        let name = executable_name("HelloWorld");
        assert!(name.starts_with("HelloWorld"));
        assert_eq!(name, format!("HelloWorld{}", std::env::consts::EXE_SUFFIX));
    }

    #[test]
    fn test_multi_config_layout_wins_when_present() {
        let build = tempdir().unwrap();
        let exe = executable_name("app");
        fs::create_dir_all(build.path().join("Release")).unwrap();
        fs::write(build.path().join("Release").join(&exe), b"").unwrap();
        fs::write(build.path().join(&exe), b"").unwrap();

        let resolved = executable_path(build.path(), "Release", "app");
        assert_eq!(resolved, build.path().join("Release").join(&exe));
    }

    #[test]
    fn test_single_config_layout_used_as_fallback() {
        let build = tempdir().unwrap();
        let exe = executable_name("app");
        fs::write(build.path().join(&exe), b"").unwrap();

        let resolved = executable_path(build.path(), "Release", "app");
        assert_eq!(resolved, build.path().join(&exe));
    }

    #[test]
    fn test_missing_binary_defaults_to_multi_config_path() {
        let build = tempdir().unwrap();
        let resolved = executable_path(build.path(), "Debug", "app");
        assert_eq!(
            resolved,
            build.path().join("Debug").join(executable_name("app"))
        );
        assert!(!resolved.exists());
    }
}
