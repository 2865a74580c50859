use crate::credentials::Credentials;
use crate::error::Result;

pub mod nuget;
pub mod version;

pub use nuget::NuGetFeed;
pub use version::ComparisonPolicy;

/// Parameters of a single feed search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub include_prerelease: bool,
    pub skip: u32,
    pub take: u32,
}

impl SearchQuery {
    /// Query used when resolving the newest version of one package.
    pub fn for_package(package: impl Into<String>) -> Self {
        Self {
            query: package.into(),
            include_prerelease: true,
            skip: 0,
            take: 20,
        }
    }
}

/// One search hit as reported by the feed, newest version first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub id: String,
    pub version: String,
}

impl PackageSummary {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

pub trait FeedClient: Send + Sync {
    fn search(&self, query: &SearchQuery, credentials: &Credentials) -> Result<Vec<PackageSummary>>;
}
