use crate::agents::summary::SyncOutcome;
use crate::agents::version_control::{AuthorIdentity, BranchRef, VersionControlClient, sync_branch};
use crate::credentials::Credentials;
use crate::error::Result;
use crate::verbose;

/// ChangePublisher commits modified build files and pushes the branch.
///
/// Whether anything is committed is decided from the working tree, so it
/// behaves the same whether the update ran in this process or an earlier one.
pub struct ChangePublisher<'a> {
    vcs: &'a dyn VersionControlClient,
    branch: BranchRef,
    author: AuthorIdentity,
    message: String,
    extensions: Vec<String>,
}

impl<'a> ChangePublisher<'a> {
    pub fn new(
        vcs: &'a dyn VersionControlClient,
        branch: BranchRef,
        author: AuthorIdentity,
        message: impl Into<String>,
        extensions: &[String],
    ) -> Self {
        Self {
            vcs,
            branch,
            author,
            message: message.into(),
            extensions: extensions
                .iter()
                .map(|ext| format!(".{}", ext.trim_start_matches('.').to_ascii_lowercase()))
                .collect(),
        }
    }

    /// Fetch + pull the branch first, then commit and push.
    pub fn sync_and_publish(&self, credentials: &Credentials) -> Result<SyncOutcome> {
        sync_branch(self.vcs, &self.branch, &self.author, credentials)?;
        self.publish(credentials)
    }

    /// Stage modified build files; commit and push only if any were staged.
    pub fn publish(&self, credentials: &Credentials) -> Result<SyncOutcome> {
        let staged: Vec<String> = self
            .vcs
            .status()?
            .into_iter()
            .filter(|path| self.is_build_file(path))
            .collect();

        if staged.is_empty() {
            return Ok(SyncOutcome::NothingToCommit);
        }

        for path in &staged {
            verbose!("Staging file: {}", path);
        }
        self.vcs.stage(&staged)?;
        self.vcs.commit(&self.message, &self.author, &staged)?;
        self.vcs.push(&self.branch, credentials)?;

        Ok(SyncOutcome::Pushed { staged })
    }

    fn is_build_file(&self, path: &str) -> bool {
        let lowered = path.to_ascii_lowercase();
        self.extensions.iter().any(|ext| lowered.ends_with(ext.as_str()))
    }
}
