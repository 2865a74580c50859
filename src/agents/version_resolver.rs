use crate::credentials::Credentials;
use crate::error::{NupdError, Result};
use crate::feed::{FeedClient, SearchQuery};
use crate::verbose;
use std::sync::Arc;
use std::time::Duration;

/// Fixed-interval retry: no jitter, no growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Result pages read per attempt before giving up on an exact id match.
const MAX_SEARCH_PAGES: u32 = 5;

pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// VersionResolver asks the feed for the newest version of a package, retrying
/// failed or empty lookups.
pub struct VersionResolver {
    feed: Arc<dyn FeedClient>,
    policy: RetryPolicy,
    sleep: Sleeper,
}

impl VersionResolver {
    pub fn new(feed: Arc<dyn FeedClient>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(feed, policy, Arc::new(std::thread::sleep))
    }

    pub fn with_sleeper(feed: Arc<dyn FeedClient>, policy: RetryPolicy, sleep: Sleeper) -> Self {
        Self {
            feed,
            policy,
            sleep,
        }
    }

    pub fn resolve_latest(&self, package: &str, credentials: &Credentials) -> Result<String> {
        let attempts = self.policy.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.attempt(package, credentials) {
                Ok(version) => return Ok(version),
                Err(e) => {
                    verbose!(
                        "Attempt {}/{} for '{}' failed: {}",
                        attempt,
                        attempts,
                        package,
                        e
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                (self.sleep)(self.policy.backoff);
            }
        }

        Err(NupdError::ResolutionExhausted {
            package: package.to_string(),
            attempts,
            last_error,
        })
    }

    /// One lookup. The feed search is fuzzy and ranks related ids alongside the
    /// package, so full pages are followed until a hit whose id matches the
    /// package name turns up. No match is treated like a failed request.
    fn attempt(&self, package: &str, credentials: &Credentials) -> Result<String> {
        let mut query = SearchQuery::for_package(package);

        for _ in 0..MAX_SEARCH_PAGES {
            let hits = self.feed.search(&query, credentials)?;
            let full_page = hits.len() >= query.take as usize;

            if let Some(hit) = hits.into_iter().find(|hit| hit.id.eq_ignore_ascii_case(package)) {
                return Ok(hit.version);
            }
            if !full_page {
                break;
            }
            query.skip += query.take;
        }

        Err(NupdError::Feed(format!("Package '{package}' not found")))
    }
}
