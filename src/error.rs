use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NupdError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Feed request failed: {0}")]
    Feed(String),

    #[error("Failed to resolve latest version of '{package}' after {attempts} attempts: {last_error}")]
    ResolutionExhausted {
        package: String,
        attempts: u32,
        last_error: String,
    },

    #[error("No declaration for '{package}' in {}", .path.display())]
    DeclarationNotFound { path: PathBuf, package: String },

    #[error("Failed to parse {}: {message}", .path.display())]
    XmlParse { path: PathBuf, message: String },

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Branch '{0}' does not exist locally")]
    BranchNotFound(String),

    #[error("Push of branch '{branch}' was rejected: {message}")]
    PushRejected { branch: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl NupdError {
    /// Errors the updater isolates to a single package instead of aborting the run.
    pub fn is_package_scoped(&self) -> bool {
        matches!(
            self,
            NupdError::ResolutionExhausted { .. } | NupdError::DeclarationNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, NupdError>;
