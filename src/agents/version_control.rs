use crate::credentials::Credentials;
use crate::error::{NupdError, Result};
use crate::utils::path_validator::PathValidator;
use crate::verbose;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const USERNAME_ENV: &str = "NUPD_GIT_USERNAME";
const PASSWORD_ENV: &str = "NUPD_GIT_PASSWORD";

/// Inline helper answering git's credential requests from the child's
/// environment, so the secret never appears on a command line.
const CREDENTIAL_HELPER: &str = "credential.helper=!f() { test \"$1\" = get && echo \"username=${NUPD_GIT_USERNAME}\" && echo \"password=${NUPD_GIT_PASSWORD}\"; }; f";

/// Name and email recorded on merge and update commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorIdentity {
    pub name: String,
    pub email: String,
}

impl AuthorIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// The single branch a run works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub local: String,
    pub remote: String,
}

impl BranchRef {
    pub fn new(local: impl Into<String>) -> Self {
        Self::with_remote(local, "origin")
    }

    pub fn with_remote(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        PathValidator::validate_branch_name(&self.local)?;
        if self.remote.is_empty() || self.remote.starts_with('-') {
            return Err(NupdError::Configuration(format!(
                "Invalid remote name '{}'",
                self.remote
            )));
        }
        Ok(())
    }

    /// `refs/heads/<branch>:refs/remotes/<remote>/<branch>`
    pub fn fetch_refspec(&self) -> String {
        format!(
            "refs/heads/{0}:refs/remotes/{1}/{0}",
            self.local, self.remote
        )
    }
}

/// The git operations the workflows need, and nothing more.
pub trait VersionControlClient {
    fn fetch(&self, remote: &str, refspecs: &[String], credentials: &Credentials) -> Result<()>;

    /// Checks out an existing local branch and pulls it from its remote.
    fn checkout_and_pull(
        &self,
        branch: &BranchRef,
        author: &AuthorIdentity,
        credentials: &Credentials,
    ) -> Result<()>;

    /// Paths with uncommitted changes, relative to the repository root.
    fn status(&self) -> Result<Vec<String>>;

    fn stage(&self, paths: &[String]) -> Result<()>;

    /// Commits exactly `paths`; anything else already in the index stays staged.
    fn commit(&self, message: &str, author: &AuthorIdentity, paths: &[String]) -> Result<()>;

    fn push(&self, branch: &BranchRef, credentials: &Credentials) -> Result<()>;
}

/// Fetch then checkout + pull: the first step of both workflows.
pub fn sync_branch(
    vcs: &dyn VersionControlClient,
    branch: &BranchRef,
    author: &AuthorIdentity,
    credentials: &Credentials,
) -> Result<()> {
    vcs.fetch(&branch.remote, &[branch.fetch_refspec()], credentials)?;
    vcs.checkout_and_pull(branch, author, credentials)
}

/// GitCli drives the system `git` binary inside one working tree.
pub struct GitCli {
    repo_path: PathBuf,
}

impl GitCli {
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self> {
        let repo_path = PathValidator::validate_repository_path(repo_path)?;
        Ok(Self { repo_path })
    }

    fn command(&self) -> Command {
        let mut command = Command::new("git");
        command
            .current_dir(&self.repo_path)
            .env("GIT_TERMINAL_PROMPT", "0");
        command
    }

    fn run_git(&self, args: &[&str]) -> Result<Output> {
        verbose!("git {}", args.join(" "));
        self.command()
            .args(args)
            .output()
            .map_err(|e| Self::spawn_error(args, e))
    }

    fn run_git_authenticated(&self, args: &[&str], credentials: &Credentials) -> Result<Output> {
        verbose!("git {} (authenticated)", args.join(" "));
        self.command()
            .env(USERNAME_ENV, credentials.principal())
            .env(PASSWORD_ENV, credentials.secret())
            .args(["-c", "credential.helper=", "-c", CREDENTIAL_HELPER])
            .args(args)
            .output()
            .map_err(|e| Self::spawn_error(args, e))
    }

    fn spawn_error(args: &[&str], e: std::io::Error) -> NupdError {
        NupdError::GitOperation(format!(
            "Failed to execute git command '{}': {e}",
            args.join(" ")
        ))
    }

    fn ensure_success(output: &Output, command: &str) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }

        Err(NupdError::GitOperation(format!(
            "{} failed: {}",
            command,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }

    /// Status paths are relative to the top level even when the working
    /// directory is a subdirectory of it.
    fn pathspecs(paths: &[String]) -> Vec<String> {
        paths.iter().map(|p| format!(":(top,literal){p}")).collect()
    }

    fn identity_args(author: &AuthorIdentity) -> [String; 4] {
        [
            "-c".to_string(),
            format!("user.name={}", author.name),
            "-c".to_string(),
            format!("user.email={}", author.email),
        ]
    }
}

impl VersionControlClient for GitCli {
    fn fetch(&self, remote: &str, refspecs: &[String], credentials: &Credentials) -> Result<()> {
        let mut args = vec!["fetch", remote];
        args.extend(refspecs.iter().map(String::as_str));
        let output = self.run_git_authenticated(&args, credentials)?;
        Self::ensure_success(&output, "git fetch")
    }

    fn checkout_and_pull(
        &self,
        branch: &BranchRef,
        author: &AuthorIdentity,
        credentials: &Credentials,
    ) -> Result<()> {
        let local_ref = format!("refs/heads/{}", branch.local);
        let exists = self.run_git(&["rev-parse", "--verify", "--quiet", &local_ref])?;
        if !exists.status.success() {
            return Err(NupdError::BranchNotFound(branch.local.clone()));
        }

        let output = self.run_git(&["checkout", &branch.local])?;
        Self::ensure_success(&output, "git checkout")?;

        let identity = Self::identity_args(author);
        let mut args: Vec<&str> = identity.iter().map(String::as_str).collect();
        args.extend([
            "pull",
            "--no-rebase",
            "--no-edit",
            branch.remote.as_str(),
            branch.local.as_str(),
        ]);
        let output = self.run_git_authenticated(&args, credentials)?;
        Self::ensure_success(&output, "git pull")
    }

    fn status(&self) -> Result<Vec<String>> {
        let output = self.run_git(&["status", "--porcelain=v1", "-z", "--untracked-files=all"])?;
        Self::ensure_success(&output, "git status")?;
        Ok(parse_porcelain(&output.stdout))
    }

    fn stage(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let pathspecs = Self::pathspecs(paths);
        let mut args = vec!["add", "--"];
        args.extend(pathspecs.iter().map(String::as_str));

        let output = self.run_git(&args)?;
        Self::ensure_success(&output, "git add")
    }

    fn commit(&self, message: &str, author: &AuthorIdentity, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Err(NupdError::GitOperation(
                "git commit requires at least one path".to_string(),
            ));
        }

        let identity = Self::identity_args(author);
        let pathspecs = Self::pathspecs(paths);
        let mut args: Vec<&str> = identity.iter().map(String::as_str).collect();
        args.extend(["commit", "--only", "-m", message, "--"]);
        args.extend(pathspecs.iter().map(String::as_str));

        let output = self.run_git(&args)?;
        Self::ensure_success(&output, "git commit")
    }

    fn push(&self, branch: &BranchRef, credentials: &Credentials) -> Result<()> {
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch.local);
        let output =
            self.run_git_authenticated(&["push", branch.remote.as_str(), &refspec], credentials)?;

        if output.status.success() {
            return Ok(());
        }

        Err(NupdError::PushRejected {
            branch: branch.local.clone(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Parses `git status --porcelain=v1 -z` output into the changed paths.
fn parse_porcelain(stdout: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(stdout);
    let mut entries = text.split('\0').filter(|entry| !entry.is_empty());
    let mut paths = Vec::new();

    while let Some(entry) = entries.next() {
        let Some(path) = entry.get(3..) else {
            continue;
        };

        // Renames and copies are followed by their source path.
        if entry.starts_with('R') || entry.starts_with('C') {
            entries.next();
        }

        paths.push(path.to_string());
    }

    paths
}
