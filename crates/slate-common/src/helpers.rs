//! Common helper functions for Slate.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Directory of bundled image resources, adjacent to the executable.
pub fn resource_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| Error::config("executable has no parent directory"))?;
    Ok(dir.join("Resources"))
}

/// Resolve a resource path: absolute paths pass through, relative paths are
/// joined onto [`resource_dir`].
pub fn resolve_resource(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(resource_dir()?.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_dir_sits_next_to_the_executable() {
        let dir = resource_dir().unwrap();
        assert!(dir.ends_with("Resources"));
    }

    #[test]
    fn absolute_paths_pass_through_unchanged() {
        let path = if cfg!(windows) {
            PathBuf::from(r"C:\images\dashboard.png")
        } else {
            PathBuf::from("/images/dashboard.png")
        };
        assert_eq!(resolve_resource(&path).unwrap(), path);
    }

    #[test]
    fn relative_paths_resolve_under_the_resource_dir() {
        let resolved = resolve_resource(Path::new("dashboard.png")).unwrap();
        assert!(resolved.ends_with(Path::new("Resources/dashboard.png")));
    }
}
