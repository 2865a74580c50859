use crate::error::{NupdError, Result};
use std::path::{Path, PathBuf};

/// Provides safe path validation helpers to avoid traversal and host intrusion.
pub struct PathValidator;

impl PathValidator {
    /// Validates and canonicalises an incoming repository path.
    pub fn validate_repository_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            return Err(NupdError::Configuration(
                "Repository path cannot be empty".to_string(),
            ));
        }

        if !path.exists() {
            return Err(NupdError::NotFound(path.to_path_buf()));
        }

        let canonical = path.canonicalize().map_err(|e| {
            NupdError::Configuration(format!("Invalid path '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(NupdError::Configuration(format!(
                "Path '{}' is not a directory",
                canonical.display()
            )));
        }

        const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);

            if path.starts_with(forbidden_path) || canonical.starts_with(forbidden_path) {
                return Err(NupdError::Configuration(format!(
                    "Access to system directory '{}' is not allowed",
                    forbidden
                )));
            }
        }

        Ok(canonical)
    }

    /// Rejects branch names git would read as options or refuse as refs.
    pub fn validate_branch_name(branch: &str) -> Result<()> {
        let invalid = branch.is_empty()
            || branch.starts_with('-')
            || branch.starts_with('/')
            || branch.ends_with('/')
            || branch.ends_with(".lock")
            || branch.contains("..")
            || branch.contains("//")
            || branch.contains("@{")
            || branch
                .chars()
                .any(|c| c.is_control() || c.is_whitespace() || "~^:?*[\\".contains(c));

        if invalid {
            return Err(NupdError::Configuration(format!(
                "Invalid branch name '{branch}'"
            )));
        }

        Ok(())
    }
}
