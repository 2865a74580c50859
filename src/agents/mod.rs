pub mod change_publisher;
pub mod dependency_updater;
pub mod project_file;
pub mod project_scanner;
pub mod summary;
pub mod version_control;
pub mod version_resolver;

pub use change_publisher::ChangePublisher;
pub use dependency_updater::{BranchSync, DependencyUpdater, UpdateMode};
pub use project_scanner::{PackageScanner, ScopeFilter};
pub use summary::{SyncOutcome, UpdateSummary};
pub use version_control::GitCli;
pub use version_resolver::VersionResolver;
