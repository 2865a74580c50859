use crate::agents::{
    BranchSync, ChangePublisher, DependencyUpdater, GitCli, PackageScanner, ScopeFilter,
    SyncOutcome, UpdateMode, UpdateSummary, VersionResolver,
};
use crate::agents::version_control::BranchRef;
use crate::cli::ResolveOptions;
use crate::config::Settings;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::feed::{ComparisonPolicy, NuGetFeed};
use crate::utils::path_validator::PathValidator;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_BRANCH: &str = "master";

/// Whether a finished run left anything behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Clean,
    /// Finished, but some packages or files were skipped because of errors.
    Partial,
}

impl RunStatus {
    fn from_summary(summary: &UpdateSummary) -> Self {
        if summary.is_clean() {
            RunStatus::Clean
        } else {
            RunStatus::Partial
        }
    }
}

/// Inputs of the feed-facing commands.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub repo_path: PathBuf,
    pub user: String,
    pub secret: String,
    pub branch: Option<String>,
    pub feed_url: String,
    pub options: ResolveOptions,
    pub config: Option<PathBuf>,
}

/// Execute the update workflow
pub fn execute_update(request: &UpdateRequest) -> Result<RunStatus> {
    println!("{}", "Starting package update process...".cyan().bold());

    println!("\n{}", "1. Validating inputs...".yellow());
    let prepared = prepare(request)?;
    println!("{}", "✓ Inputs are valid".green());

    let summary = run_update(&prepared, request, UpdateMode::Apply, 2)?;
    print_update_summary(&summary);

    if summary.has_changes() {
        println!(
            "\n{}",
            "✨ Build files updated; run `nupd push` to publish them.".green().bold()
        );
    } else {
        println!("\n{}", "No updates were applied".yellow());
    }

    Ok(RunStatus::from_summary(&summary))
}

/// Execute the check workflow (dry-run, no git)
pub fn execute_check(request: &UpdateRequest) -> Result<RunStatus> {
    println!("{}", "Checking for available package updates...".cyan().bold());

    println!("\n{}", "1. Validating inputs...".yellow());
    let prepared = prepare(request)?;
    println!("{}", "✓ Inputs are valid".green());

    let summary = run_update(&prepared, request, UpdateMode::CheckOnly, 2)?;
    print_update_summary(&summary);

    if !summary.updated.is_empty() {
        println!("\n{}", "To apply these updates, run:".dimmed());
        println!("  {}", "nupd update <REPO> <USER> <SECRET> <BRANCH> <FEED_URL>".cyan());
    }

    Ok(RunStatus::from_summary(&summary))
}

/// Execute the push workflow: pull, commit modified build files, push
pub fn execute_push(
    repo_path: &Path,
    secret: &str,
    branch: &str,
    user: &str,
    config: Option<&Path>,
) -> Result<RunStatus> {
    println!("{}", "Starting push process...".cyan().bold());

    println!("\n{}", "1. Validating inputs...".yellow());
    let repo_path = PathValidator::validate_repository_path(repo_path)?;
    let settings = Settings::load(&repo_path, config)?;
    let branch = BranchRef::with_remote(branch_or_default(Some(branch)), settings.remote.clone());
    branch.validate()?;
    let git = GitCli::new(&repo_path)?;
    println!("{}", "✓ Inputs are valid".green());

    println!(
        "\n{}",
        format!("2. Pulling '{}' and committing build file changes...", branch.local).yellow()
    );
    let credentials = Credentials::new(user, secret);
    let publisher = ChangePublisher::new(
        &git,
        branch,
        settings.author(user),
        settings.commit_message.clone(),
        &settings.extensions,
    );
    let outcome = publisher.sync_and_publish(&credentials)?;
    print_sync_outcome(&outcome, &settings.extensions);

    Ok(RunStatus::Clean)
}

/// Execute update and push in one run
pub fn execute_sync(request: &UpdateRequest) -> Result<RunStatus> {
    println!("{}", "Starting update and push process...".cyan().bold());

    println!("\n{}", "1. Validating inputs...".yellow());
    let prepared = prepare(request)?;
    println!("{}", "✓ Inputs are valid".green());

    let summary = run_update(&prepared, request, UpdateMode::Apply, 2)?;
    print_update_summary(&summary);

    println!("\n{}", "3. Committing build file changes...".yellow());
    let git = GitCli::new(&prepared.repo_path)?;
    let credentials = Credentials::new(&request.user, &request.secret);
    let publisher = ChangePublisher::new(
        &git,
        prepared.branch.clone(),
        prepared.settings.author(&request.user),
        prepared.settings.commit_message.clone(),
        &prepared.settings.extensions,
    );
    // The branch was pulled before updating; the working tree decides the rest.
    let outcome = publisher.publish(&credentials)?;
    print_sync_outcome(&outcome, &prepared.settings.extensions);

    Ok(RunStatus::from_summary(&summary))
}

struct Prepared {
    repo_path: PathBuf,
    settings: Settings,
    branch: BranchRef,
    updater: DependencyUpdater,
}

/// Validates every input before any network or write activity.
fn prepare(request: &UpdateRequest) -> Result<Prepared> {
    let repo_path = PathValidator::validate_repository_path(&request.repo_path)?;
    let mut settings = Settings::load(&repo_path, request.config.as_deref())?;

    if let Some(prefix) = &request.options.prefix {
        settings.prefix = prefix.clone();
    }
    if request.options.semantic {
        settings.comparison = ComparisonPolicy::Semantic;
    }
    settings.validate()?;

    let branch = BranchRef::with_remote(
        branch_or_default(request.branch.as_deref()),
        settings.remote.clone(),
    );
    branch.validate()?;

    let feed = Arc::new(NuGetFeed::new(&request.feed_url)?);
    let scanner = PackageScanner::new(
        &repo_path,
        &settings.extensions,
        ScopeFilter::new(settings.prefix.clone()),
    );
    let resolver = VersionResolver::new(feed, settings.retry);
    let updater = DependencyUpdater::new(scanner, resolver, settings.comparison);

    Ok(Prepared {
        repo_path,
        settings,
        branch,
        updater,
    })
}

fn run_update(
    prepared: &Prepared,
    request: &UpdateRequest,
    mode: UpdateMode,
    step: u32,
) -> Result<UpdateSummary> {
    let credentials = Credentials::new(&request.user, &request.secret);
    let author = prepared.settings.author(&request.user);

    // Only the update and sync commands name a branch; check and --no-git leave it out.
    let git = match request.branch {
        Some(_) if mode == UpdateMode::Apply => Some(GitCli::new(&prepared.repo_path)?),
        _ => None,
    };

    match &git {
        Some(_) => println!(
            "\n{}",
            format!(
                "{step}. Pulling '{}' and updating '{}*' packages...",
                prepared.branch.local, prepared.settings.prefix
            )
            .yellow()
        ),
        None => println!(
            "\n{}",
            format!("{step}. Checking '{}*' packages...", prepared.settings.prefix).yellow()
        ),
    }

    let sync = git.as_ref().map(|git| BranchSync {
        vcs: git,
        branch: &prepared.branch,
        author: &author,
    });

    let summary = prepared.updater.run(sync, &credentials, mode)?;
    println!("{}", "✓ Package check completed".green());
    Ok(summary)
}

fn branch_or_default(branch: Option<&str>) -> String {
    match branch.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_BRANCH.to_string(),
    }
}

fn print_update_summary(summary: &UpdateSummary) {
    println!("\n{}", "Update Summary:".cyan().bold());
    println!("  Files scanned:       {}", summary.files_scanned);
    println!("  Packages considered: {}", summary.packages_considered);

    let updated_label = if summary.applied { "updated" } else { "outdated" };
    println!(
        "  {} {} / {} unchanged / {} skipped",
        summary.updated.len().to_string().green().bold(),
        updated_label,
        summary.unchanged.len(),
        summary.skipped.len().to_string().red()
    );

    if !summary.updated.is_empty() {
        println!("\n{}:", "Package updates".cyan());
        for update in &summary.updated {
            println!(
                "  • {} {} → {} ({})",
                update.package.white().bold(),
                update.from.red(),
                update.to.green(),
                update.file.display().to_string().dimmed()
            );
        }
    }

    if !summary.skipped.is_empty() {
        println!("\n{}:", "Skipped packages".red());
        for skipped in &summary.skipped {
            println!(
                "  • {} in {}: {}",
                skipped.package.white().bold(),
                skipped.file.display(),
                skipped.reason
            );
        }
    }

    if !summary.skipped_files.is_empty() {
        println!("\n{}:", "Skipped files".red());
        for skipped in &summary.skipped_files {
            println!("  • {}: {}", skipped.path.display(), skipped.reason);
        }
    }
}

fn print_sync_outcome(outcome: &SyncOutcome, extensions: &[String]) {
    match outcome {
        SyncOutcome::Pushed { staged } => {
            for path in staged {
                println!("  Staged {}", path.bright_cyan());
            }
            println!("{}", "✓ Changes committed and pushed".green());
        }
        SyncOutcome::NothingToCommit => {
            let kinds: Vec<String> = extensions
                .iter()
                .map(|ext| format!(".{}", ext.trim_start_matches('.')))
                .collect();
            println!(
                "{}",
                format!("No {} changes to commit; nothing to push.", kinds.join(" or ")).yellow()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NupdError;
    use tempfile::tempdir;

    fn request(repo: &Path, feed_url: &str) -> UpdateRequest {
        UpdateRequest {
            repo_path: repo.to_path_buf(),
            user: "jdoe".to_string(),
            secret: "pat".to_string(),
            branch: Some("master".to_string()),
            feed_url: feed_url.to_string(),
            options: ResolveOptions::default(),
            config: None,
        }
    }

    #[test]
    fn empty_branch_defaults_to_master() {
        assert_eq!(branch_or_default(Some("  ")), "master");
        assert_eq!(branch_or_default(None), "master");
        assert_eq!(branch_or_default(Some("develop")), "develop");
    }

    #[test]
    fn missing_repository_fails_before_network() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = prepare(&request(&missing, "https://example.com/v3/index.json"))
            .err()
            .unwrap();
        assert!(matches!(err, NupdError::NotFound(_)));
    }

    #[test]
    fn invalid_feed_url_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let err = prepare(&request(dir.path(), "ftp://example.com"))
            .err()
            .unwrap();
        assert!(matches!(err, NupdError::Configuration(_)));
    }

    #[test]
    fn cli_options_override_settings() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("nupd.toml"), "prefix = \"Acme\"").unwrap();
        let mut req = request(dir.path(), "https://example.com/query");
        req.options = ResolveOptions {
            prefix: Some("Contoso".to_string()),
            semantic: true,
        };

        let prepared = prepare(&req).unwrap();
        assert_eq!(prepared.settings.prefix, "Contoso");
        assert_eq!(prepared.settings.comparison, ComparisonPolicy::Semantic);
    }

    #[test]
    fn run_status_reflects_skips() {
        let mut summary = UpdateSummary::new(true);
        assert_eq!(RunStatus::from_summary(&summary), RunStatus::Clean);
        summary.record_skipped("A.csproj".into(), "CivilGeo.Core", "gone".into());
        assert_eq!(RunStatus::from_summary(&summary), RunStatus::Partial);
    }
}
