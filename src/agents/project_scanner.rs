use crate::agents::project_file::ProjectFileStore;
use crate::error::{NupdError, Result};
use crate::verbose;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const GIT_DIR: &str = ".git";

/// Case-insensitive name prefix deciding which dependencies are managed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFilter {
    prefix: String,
}

impl ScopeFilter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        name.get(..self.prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&self.prefix))
    }
}

/// A build file and the in-scope package names it declares.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub packages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub files: Vec<ScannedFile>,
    pub skipped: Vec<SkippedFile>,
}

/// PackageScanner finds build files under a root and the managed packages they use
pub struct PackageScanner {
    root: PathBuf,
    extensions: Vec<String>,
    filter: ScopeFilter,
}

impl PackageScanner {
    pub fn new<P: AsRef<Path>>(root: P, extensions: &[String], filter: ScopeFilter) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            filter,
        }
    }

    /// All build files below the root, sorted by path.
    ///
    /// Hidden directories are walked; only `.git` and gitignored paths are skipped.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(NupdError::NotFound(self.root.clone()));
        }

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .filter_entry(|entry| entry.file_name() != GIT_DIR)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    verbose!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let is_file = entry.file_type().is_some_and(|t| t.is_file());
            if is_file && self.is_build_file(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn is_build_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// In-scope package names declared in `file`, unique, in first-seen order.
    pub fn extract_in_scope(&self, file: &Path) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut packages = Vec::new();

        for declaration in ProjectFileStore::read_declarations(file)? {
            if !self.filter.matches(&declaration.name) {
                continue;
            }
            if seen.insert(declaration.name.clone()) {
                packages.push(declaration.name);
            } else {
                verbose!(
                    "Duplicate declaration of '{}' in {}; the first one is used",
                    declaration.name,
                    file.display()
                );
            }
        }

        Ok(packages)
    }

    /// Scans every build file; a file that cannot be read or parsed is
    /// recorded as skipped and does not stop the scan.
    pub fn scan_all(&self) -> Result<ScanReport> {
        let mut report = ScanReport::default();

        for path in self.scan()? {
            match self.extract_in_scope(&path) {
                Ok(packages) => report.files.push(ScannedFile { path, packages }),
                Err(e) => report.skipped.push(SkippedFile {
                    path,
                    reason: e.to_string(),
                }),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn scanner(root: &Path) -> PackageScanner {
        PackageScanner::new(
            root,
            &[".csproj".to_string(), "props".to_string()],
            ScopeFilter::new("CivilGeo"),
        )
    }

    #[test]
    fn scope_filter_is_a_case_insensitive_prefix() {
        let filter = ScopeFilter::new("CivilGeo");
        assert!(filter.matches("CivilGeo.Core"));
        assert!(filter.matches("civilgeo.grading"));
        assert!(!filter.matches("Newtonsoft.Json"));
        assert!(!filter.matches("Civil"));
        assert!(!filter.matches("ÇivilGeo"));
    }

    #[test]
    fn scan_finds_build_files_recursively() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/App")).unwrap();
        fs::write(root.join("src/App/App.csproj"), "<Project />").unwrap();
        fs::write(root.join("Directory.Packages.props"), "<Project />").unwrap();
        fs::write(root.join("README.md"), "readme").unwrap();
        fs::write(root.join("Legacy.CSPROJ"), "<Project />").unwrap();

        let files = scanner(root).scan().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("Directory.Packages.props"),
                PathBuf::from("Legacy.CSPROJ"),
                PathBuf::from("src/App/App.csproj"),
            ]
        );
    }

    #[test]
    fn scan_walks_hidden_directories_but_not_git() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".tools/Build")).unwrap();
        fs::create_dir_all(root.join(".git/modules")).unwrap();
        fs::write(root.join("App.csproj"), "<Project />").unwrap();
        fs::write(root.join(".tools/Build/Build.csproj"), "<Project />").unwrap();
        fs::write(root.join(".git/modules/Stale.csproj"), "<Project />").unwrap();

        let files = scanner(root).scan().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from(".tools/Build/Build.csproj"),
                PathBuf::from("App.csproj"),
            ]
        );
    }

    #[test]
    fn scan_missing_root_is_not_found() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = scanner(&missing).scan().unwrap_err();
        assert!(matches!(err, NupdError::NotFound(_)));
    }

    #[test]
    fn extract_keeps_in_scope_names_once_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("App.csproj");
        fs::write(
            &path,
            r#"<Project>
  <ItemGroup>
    <PackageReference Include="CivilGeo.Grading" Version="3.1.0" />
    <PackageReference Include="Newtonsoft.Json" Version="13.0.1" />
    <PackageReference Include="civilgeo.core" Version="1.0.0" />
    <PackageReference Include="CivilGeo.Grading" Version="3.0.0" />
  </ItemGroup>
</Project>"#,
        )
        .unwrap();

        let packages = scanner(dir.path()).extract_in_scope(&path).unwrap();
        assert_eq!(packages, vec!["CivilGeo.Grading", "civilgeo.core"]);
    }

    #[test]
    fn scan_all_isolates_broken_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("Broken.csproj"), "<Project><ItemGroup></Project>").unwrap();
        fs::write(
            root.join("Good.csproj"),
            r#"<Project><ItemGroup><PackageReference Include="CivilGeo.Core" Version="1.0.0" /></ItemGroup></Project>"#,
        )
        .unwrap();

        let report = scanner(root).scan_all().unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].packages, vec!["CivilGeo.Core"]);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("Broken.csproj"));
    }
}
