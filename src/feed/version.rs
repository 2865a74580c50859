use serde::Deserialize;
use std::cmp::Ordering;

/// NuGet-style version: up to four numeric release parts plus an optional
/// dot-separated pre-release label. Build metadata is ignored for ordering.
#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<u64>,
    pre: Vec<String>,
}

impl Version {
    pub fn parse(version: &str) -> Option<Self> {
        let trimmed = version.trim();
        let without_metadata = trimmed.split('+').next().unwrap_or(trimmed);
        let lowered = without_metadata.to_ascii_lowercase();

        let (release, pre) = if let Ok(v) = semver::Version::parse(&lowered) {
            let pre = if v.pre.is_empty() {
                Vec::new()
            } else {
                v.pre.as_str().split('.').map(str::to_string).collect()
            };
            (vec![v.major, v.minor, v.patch], pre)
        } else {
            Self::parse_numeric(&lowered)?
        };

        Some(Version {
            release,
            pre,
        })
    }

    /// Fallback for forms semver rejects, e.g. `1.2`, `1.2.3.4` or `1.2.3.4-beta`.
    fn parse_numeric(version: &str) -> Option<(Vec<u64>, Vec<String>)> {
        let (core, pre) = match version.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (version, None),
        };

        let release = core
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        if release.is_empty() || release.len() > 4 {
            return None;
        }

        let pre = match pre {
            Some(label) => {
                let identifiers: Vec<String> = label.split('.').map(str::to_string).collect();
                if identifiers.iter().any(|id| id.is_empty()) {
                    return None;
                }
                identifiers
            }
            None => Vec::new(),
        };

        Some((release, pre))
    }

    fn release_part(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }
}

fn compare_identifiers(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        for index in 0..4 {
            match self.release_part(index).cmp(&other.release_part(index)) {
                Ordering::Equal => continue,
                other => return other,
            }
        }

        match (self.pre.is_empty(), other.pre.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        for (a, b) in self.pre.iter().zip(other.pre.iter()) {
            match compare_identifiers(a, b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        self.pre.len().cmp(&other.pre.len())
    }
}

/// How a declared version is compared with the one the feed reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonPolicy {
    /// Opaque, case-insensitive text comparison: any other difference is an update.
    #[default]
    Text,
    /// Update only when the feed version orders strictly after the declared one.
    Semantic,
}

impl ComparisonPolicy {
    pub fn needs_update(&self, declared: &str, resolved: &str) -> bool {
        let differs = !declared.eq_ignore_ascii_case(resolved);
        match self {
            ComparisonPolicy::Text => differs,
            ComparisonPolicy::Semantic => match (Version::parse(declared), Version::parse(resolved)) {
                (Some(current), Some(candidate)) => candidate > current,
                // Floating ranges or property references cannot be ordered.
                _ => differs,
            },
        }
    }
}
