use crate::agents::project_file::ProjectFileStore;
use crate::agents::project_scanner::PackageScanner;
use crate::agents::summary::UpdateSummary;
use crate::agents::version_control::{AuthorIdentity, BranchRef, VersionControlClient, sync_branch};
use crate::agents::version_resolver::VersionResolver;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::feed::ComparisonPolicy;
use crate::verbose;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Rewrite declarations that are behind the feed.
    Apply,
    /// Report what would change without writing.
    CheckOnly,
}

/// The branch to bring up to date before scanning.
pub struct BranchSync<'a> {
    pub vcs: &'a dyn VersionControlClient,
    pub branch: &'a BranchRef,
    pub author: &'a AuthorIdentity,
}

/// DependencyUpdater runs the update workflow: sync the branch, scan build
/// files, then resolve, compare and rewrite each managed package.
///
/// Failures to resolve a package or to find its declaration are isolated to
/// that package; branch sync failures and write failures abort the run.
pub struct DependencyUpdater {
    scanner: PackageScanner,
    resolver: VersionResolver,
    policy: ComparisonPolicy,
}

impl DependencyUpdater {
    pub fn new(scanner: PackageScanner, resolver: VersionResolver, policy: ComparisonPolicy) -> Self {
        Self {
            scanner,
            resolver,
            policy,
        }
    }

    pub fn run(
        &self,
        sync: Option<BranchSync<'_>>,
        credentials: &Credentials,
        mode: UpdateMode,
    ) -> Result<UpdateSummary> {
        if let Some(sync) = sync {
            sync_branch(sync.vcs, sync.branch, sync.author, credentials)?;
        }

        let scan = self.scanner.scan_all()?;
        let mut summary = UpdateSummary::new(mode == UpdateMode::Apply);
        summary.files_scanned = scan.files.len() + scan.skipped.len();

        for skipped in &scan.skipped {
            println!(
                "{}",
                format!("⚠ Skipping {}: {}", skipped.path.display(), skipped.reason).red()
            );
        }
        summary.skipped_files = scan.skipped;

        let total: usize = scan.files.iter().map(|f| f.packages.len()).sum();
        if total == 0 {
            return Ok(summary);
        }

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  [{bar:40}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );

        // Keyed case-insensitively: NuGet ids are case-insensitive.
        let mut resolved: HashMap<String, std::result::Result<String, String>> = HashMap::new();

        for file in &scan.files {
            verbose!(
                "{}: in-scope packages [{}]",
                file.path.display(),
                file.packages.join(", ")
            );

            for package in &file.packages {
                pb.set_message(format!("Checking {}", package));
                summary.packages_considered += 1;

                let latest = resolved
                    .entry(package.to_ascii_lowercase())
                    .or_insert_with(|| {
                        self.resolver
                            .resolve_latest(package, credentials)
                            .map_err(|e| e.to_string())
                    })
                    .clone();

                let latest = match latest {
                    Ok(version) => version,
                    Err(reason) => {
                        pb.println(format!("  {} {}", "✗".red(), reason));
                        summary.record_skipped(file.path.clone(), package, reason);
                        pb.inc(1);
                        continue;
                    }
                };

                let declared = match ProjectFileStore::read_declared_version(&file.path, package) {
                    Ok(version) => version,
                    Err(e) if e.is_package_scoped() => {
                        pb.println(format!("  {} {}", "✗".red(), e));
                        summary.record_skipped(file.path.clone(), package, e.to_string());
                        pb.inc(1);
                        continue;
                    }
                    Err(e) => {
                        pb.finish_and_clear();
                        return Err(e);
                    }
                };

                if !self.policy.needs_update(&declared, &latest) {
                    pb.println(format!("  package '{}' already updated.", package));
                    summary.record_unchanged(file.path.clone(), package, declared);
                    pb.inc(1);
                    continue;
                }

                if mode == UpdateMode::Apply {
                    if let Err(e) =
                        ProjectFileStore::write_declared_version(&file.path, package, &latest)
                    {
                        pb.finish_and_clear();
                        return Err(e);
                    }
                    pb.println(format!(
                        "  package '{}' is updated from '{}' to latest version '{}'",
                        package,
                        declared.red(),
                        latest.green()
                    ));
                } else {
                    pb.println(format!(
                        "  package '{}' can be updated from '{}' to '{}'",
                        package,
                        declared.red(),
                        latest.green()
                    ));
                }

                summary.record_update(file.path.clone(), package, declared, latest);
                pb.inc(1);
            }
        }

        pb.finish_and_clear();
        Ok(summary)
    }
}
