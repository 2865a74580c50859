use crate::agents::version_control::AuthorIdentity;
use crate::agents::version_resolver::RetryPolicy;
use crate::error::{NupdError, Result};
use crate::feed::ComparisonPolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Looked up at the repository root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "nupd.toml";

pub const DEFAULT_PREFIX: &str = "CivilGeo";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Updated package reference in .csproj file";
pub const DEFAULT_AUTHOR_NAME: &str = "Author Name";
pub const DEFAULT_REMOTE: &str = "origin";

/// Optional settings file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    prefix: Option<String>,
    author_name: Option<String>,
    author_email: Option<String>,
    commit_message: Option<String>,
    remote: Option<String>,
    extensions: Option<Vec<String>>,
    retry_attempts: Option<u32>,
    retry_backoff_secs: Option<u64>,
    comparison: Option<ComparisonPolicy>,
}

/// Effective settings: defaults, overridden by the file, overridden by flags.
#[derive(Debug, Clone)]
pub struct Settings {
    pub prefix: String,
    pub author_name: String,
    pub author_email: Option<String>,
    pub commit_message: String,
    pub remote: String,
    pub extensions: Vec<String>,
    pub retry: RetryPolicy,
    pub comparison: ComparisonPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            author_name: DEFAULT_AUTHOR_NAME.to_string(),
            author_email: None,
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
            extensions: vec!["csproj".to_string(), "props".to_string()],
            retry: RetryPolicy::default(),
            comparison: ComparisonPolicy::default(),
        }
    }
}

impl Settings {
    /// Loads `explicit` if given (it must exist), else `<repo>/nupd.toml` if present.
    pub fn load(repo_path: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path: Option<PathBuf> = match explicit {
            Some(path) if !path.is_file() => return Err(NupdError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Some(repo_path.join(CONFIG_FILE_NAME)).filter(|p| p.is_file()),
        };

        match path {
            Some(path) => {
                let content = fs::read_to_string(&path)?;
                Self::from_toml(&content)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut settings = Self::default();

        if let Some(prefix) = file.prefix {
            settings.prefix = prefix;
        }
        if let Some(name) = file.author_name {
            settings.author_name = name;
        }
        if file.author_email.is_some() {
            settings.author_email = file.author_email;
        }
        if let Some(message) = file.commit_message {
            settings.commit_message = message;
        }
        if let Some(remote) = file.remote {
            settings.remote = remote;
        }
        if let Some(extensions) = file.extensions {
            settings.extensions = extensions;
        }
        if let Some(attempts) = file.retry_attempts {
            settings.retry.attempts = attempts;
        }
        if let Some(secs) = file.retry_backoff_secs {
            settings.retry.backoff = Duration::from_secs(secs);
        }
        if let Some(comparison) = file.comparison {
            settings.comparison = comparison;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefix.trim().is_empty() {
            return Err(NupdError::Configuration(
                "Package prefix cannot be empty".to_string(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(NupdError::Configuration(
                "At least one build file extension is required".to_string(),
            ));
        }
        if self.commit_message.trim().is_empty() {
            return Err(NupdError::Configuration(
                "Commit message cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Commit identity; the email falls back to the git user id.
    pub fn author(&self, user: &str) -> AuthorIdentity {
        AuthorIdentity::new(
            self.author_name.clone(),
            self.author_email.clone().unwrap_or_else(|| user.to_string()),
        )
    }
}
