use crate::agents::project_scanner::SkippedFile;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUpdate {
    pub file: PathBuf,
    pub package: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnchangedPackage {
    pub file: PathBuf,
    pub package: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPackage {
    pub file: PathBuf,
    pub package: String,
    pub reason: String,
}

/// Outcome of one update run. Replaces a process-wide "changes made" flag:
/// callers inspect [`UpdateSummary::has_changes`] instead.
#[derive(Debug, Clone, Default)]
pub struct UpdateSummary {
    /// Whether rewrites were applied to disk (false for a check run).
    pub applied: bool,
    pub files_scanned: usize,
    pub packages_considered: usize,
    pub updated: Vec<PackageUpdate>,
    pub unchanged: Vec<UnchangedPackage>,
    pub skipped: Vec<SkippedPackage>,
    pub skipped_files: Vec<SkippedFile>,
}

impl UpdateSummary {
    pub fn new(applied: bool) -> Self {
        Self {
            applied,
            ..Self::default()
        }
    }

    /// True once at least one declaration was rewritten on disk.
    pub fn has_changes(&self) -> bool {
        self.applied && !self.updated.is_empty()
    }

    /// A run is clean when nothing was skipped for errors.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.skipped_files.is_empty()
    }

    pub fn record_update(&mut self, file: PathBuf, package: &str, from: String, to: String) {
        self.updated.push(PackageUpdate {
            file,
            package: package.to_string(),
            from,
            to,
        });
    }

    pub fn record_unchanged(&mut self, file: PathBuf, package: &str, version: String) {
        self.unchanged.push(UnchangedPackage {
            file,
            package: package.to_string(),
            version,
        });
    }

    pub fn record_skipped(&mut self, file: PathBuf, package: &str, reason: String) {
        self.skipped.push(SkippedPackage {
            file,
            package: package.to_string(),
            reason,
        });
    }
}

/// What the push workflow ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Pushed { staged: Vec<String> },
    NothingToCommit,
}
