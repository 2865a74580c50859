use crate::credentials::Credentials;
use crate::error::{NupdError, Result};
use crate::feed::{FeedClient, PackageSummary, SearchQuery};
use crate::verbose;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
const SEARCH_RESOURCE_TYPE: &str = "SearchQueryService";

/// NuGet v3 feed client.
///
/// The configured URL may point at the service index (`.../index.json`), in
/// which case the search endpoint is discovered on first use, or directly at a
/// search endpoint.
pub struct NuGetFeed {
    client: Client,
    feed_url: Url,
    search_url: Mutex<Option<Url>>,
}

impl NuGetFeed {
    pub fn new(feed_url: &str) -> Result<Self> {
        let feed_url = Self::validate_feed_url(feed_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("nupd/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let search_url = if Self::is_service_index(&feed_url) {
            None
        } else {
            Some(feed_url.clone())
        };

        Ok(Self {
            client,
            feed_url,
            search_url: Mutex::new(search_url),
        })
    }

    fn is_service_index(url: &Url) -> bool {
        url.path().ends_with("index.json")
    }

    fn search_endpoint(&self, credentials: &Credentials) -> Result<Url> {
        let mut cached = self
            .search_url
            .lock()
            .map_err(|_| NupdError::Feed("search endpoint cache poisoned".to_string()))?;

        if let Some(url) = cached.as_ref() {
            return Ok(url.clone());
        }

        verbose!("Reading service index {}", self.feed_url);
        let index: ServiceIndex = self.get_json(self.feed_url.clone(), credentials)?;
        let url = search_endpoint_from_index(&index).ok_or_else(|| {
            NupdError::Feed(format!(
                "Service index {} does not advertise a {SEARCH_RESOURCE_TYPE} resource",
                self.feed_url
            ))
        })?;

        *cached = Some(url.clone());
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url, credentials: &Credentials) -> Result<T> {
        let response = self
            .client
            .get(url.clone())
            .basic_auth(credentials.principal(), Some(credentials.secret()))
            .send()
            .map_err(|e| NupdError::Feed(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            verbose!("HTTP {}: {}", status, url);
            return Err(NupdError::Feed(format!("HTTP {status} from {url}")));
        }

        let text = response.text()?;
        if text.len() > MAX_RESPONSE_BYTES {
            return Err(NupdError::Feed(format!(
                "Response from {url} exceeded 10MB limit"
            )));
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn validate_feed_url(url: &str) -> Result<Url> {
        let parsed = Url::parse(url.trim())
            .map_err(|_| NupdError::Configuration(format!("Invalid feed URL: {url}")))?;

        match parsed.scheme() {
            "https" | "http" => Ok(parsed),
            scheme => Err(NupdError::Configuration(format!(
                "Unsupported feed scheme: {scheme}"
            ))),
        }
    }
}

impl FeedClient for NuGetFeed {
    fn search(&self, query: &SearchQuery, credentials: &Credentials) -> Result<Vec<PackageSummary>> {
        let endpoint = self.search_endpoint(credentials)?;
        let url = build_search_url(&endpoint, query);
        verbose!("Searching feed: {}", url);

        let response: SearchResponse = self.get_json(url, credentials)?;
        Ok(response
            .data
            .into_iter()
            .map(|hit| PackageSummary::new(hit.id, hit.version))
            .collect())
    }
}

fn build_search_url(endpoint: &Url, query: &SearchQuery) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("q", &query.query)
        .append_pair("prerelease", if query.include_prerelease { "true" } else { "false" })
        .append_pair("skip", &query.skip.to_string())
        .append_pair("take", &query.take.to_string())
        .append_pair("semVerLevel", "2.0.0");
    url
}

fn search_endpoint_from_index(index: &ServiceIndex) -> Option<Url> {
    index
        .resources
        .iter()
        .filter(|resource| resource.kind.starts_with(SEARCH_RESOURCE_TYPE))
        .find_map(|resource| Url::parse(&resource.id).ok())
}

#[derive(Debug, Deserialize)]
struct ServiceIndex {
    #[serde(default)]
    resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
struct ServiceResource {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
    version: String,
}
