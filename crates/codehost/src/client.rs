use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::coordinates::{HostKind, RepoCoordinates};
use crate::error::{CodehostError, Result};

const GITHUB_JSON: &str = "application/vnd.github+json";
const GITHUB_RAW: &str = "application/vnd.github.raw+json";

/// Connection settings for a [`HostClient`].
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Personal access token sent as a bearer credential when present.
    pub token: Option<String>,
    pub api_root: String,
    pub cache_entries: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            user_agent: "repoguard/0.1 (+https://github.com/repoguard/repoguard)".to_string(),
            timeout_secs: 30,
            token: None,
            api_root: "https://api.github.com".to_string(),
            cache_entries: 128,
        }
    }
}

/// Repository metadata as returned by the host's repository endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, rename = "size")]
    pub size_kb: u64,
    #[serde(default, rename = "stargazers_count")]
    pub stars: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// One entry of a repository's top-level directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
}

impl FileEntry {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

/// One hit from the host's repository search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "stargazers_count")]
    pub stars: u64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchHit>,
}

/// Snapshot of one repository assembled from a metadata call plus a top-level
/// listing call. This is the unit the detector and the ledger both consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoAnalysis {
    pub canonical_url: String,
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub size_kb: u64,
    pub stars: u64,
    pub created_at: Option<String>,
    /// Names of regular files in the repository root, listing order.
    pub top_level_files: Vec<String>,
}

/// Read-only client for the GitHub REST API with small per-endpoint LRU
/// caches, so that comparing one repository against many candidates fetches
/// each document at most once.
pub struct HostClient {
    http: reqwest::Client,
    token: Option<String>,
    api_root: String,
    metadata_cache: Mutex<LruCache<String, RepoMetadata>>,
    listing_cache: Mutex<LruCache<String, Vec<FileEntry>>>,
    content_cache: Mutex<LruCache<String, String>>,
}

impl HostClient {
    pub fn new(config: &HostConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let capacity = NonZeroUsize::new(config.cache_entries).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            http,
            token: config.token.clone(),
            api_root: config.api_root.trim_end_matches('/').to_string(),
            metadata_cache: Mutex::new(LruCache::new(capacity)),
            listing_cache: Mutex::new(LruCache::new(capacity)),
            content_cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Fetches repository metadata.
    pub async fn metadata(&self, coords: &RepoCoordinates) -> Result<RepoMetadata> {
        self.ensure_github(coords)?;
        let key = coords.canonical_url();
        if let Some(cached) = self.metadata_cache.lock().await.get(&key) {
            return Ok(cached.clone());
        }

        let url = format!("{}/repos/{}/{}", self.api_root, coords.owner, coords.name);
        let response = self.get(&url, GITHUB_JSON).send().await?;
        let response = self.checked(response, &url)?;
        let metadata: RepoMetadata = response.json().await?;

        self.metadata_cache.lock().await.put(key, metadata.clone());
        Ok(metadata)
    }

    /// Lists the repository's root directory.
    pub async fn top_level_files(&self, coords: &RepoCoordinates) -> Result<Vec<FileEntry>> {
        self.ensure_github(coords)?;
        let key = coords.canonical_url();
        if let Some(cached) = self.listing_cache.lock().await.get(&key) {
            return Ok(cached.clone());
        }

        let url = format!(
            "{}/repos/{}/{}/contents",
            self.api_root, coords.owner, coords.name
        );
        let response = self.get(&url, GITHUB_JSON).send().await?;
        let response = self.checked(response, &url)?;
        let listing: Vec<FileEntry> = response.json().await?;

        self.listing_cache.lock().await.put(key, listing.clone());
        Ok(listing)
    }

    /// Downloads one file as text, reading at most `byte_cap` bytes of the
    /// body. Bodies truncated mid-character are repaired lossily.
    pub async fn file_text(
        &self,
        coords: &RepoCoordinates,
        path: &str,
        byte_cap: usize,
    ) -> Result<String> {
        self.ensure_github(coords)?;
        let key = format!("{}:{path}@{byte_cap}", coords.canonical_url());
        if let Some(cached) = self.content_cache.lock().await.get(&key) {
            return Ok(cached.clone());
        }

        let url = format!(
            "{}/repos/{}/{}/contents/{path}",
            self.api_root, coords.owner, coords.name
        );
        let response = self.get(&url, GITHUB_RAW).send().await?;
        let mut response = self.checked(response, &url)?;

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let remaining = byte_cap.saturating_sub(body.len());
            if remaining == 0 {
                break;
            }
            let take = remaining.min(chunk.len());
            body.extend_from_slice(&chunk[..take]);
        }
        let text = String::from_utf8_lossy(&body).into_owned();

        self.content_cache.lock().await.put(key, text.clone());
        Ok(text)
    }

    /// Runs one page of repository search, best-match order.
    pub async fn search_repositories(
        &self,
        query: &str,
        per_page: usize,
    ) -> Result<Vec<SearchHit>> {
        let url = format!("{}/search/repositories", self.api_root);
        log::debug!("searching repositories: {query:?}");
        let response = self
            .get(&url, GITHUB_JSON)
            .query(&[("q", query.to_string()), ("per_page", per_page.to_string())])
            .send()
            .await?;
        let response = self.checked(response, &url)?;
        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.items)
    }

    /// Assembles a [`RepoAnalysis`] from the metadata and listing endpoints.
    pub async fn analyze(&self, coords: &RepoCoordinates) -> Result<RepoAnalysis> {
        let metadata = self.metadata(coords).await?;
        let listing = self.top_level_files(coords).await?;
        let top_level_files = listing
            .iter()
            .filter(|entry| entry.is_file())
            .map(|entry| entry.name.clone())
            .collect();
        Ok(RepoAnalysis {
            canonical_url: coords.canonical_url(),
            name: metadata.name,
            description: metadata.description,
            language: metadata.language,
            size_kb: metadata.size_kb,
            stars: metadata.stars,
            created_at: metadata.created_at,
            top_level_files,
        })
    }

    fn ensure_github(&self, coords: &RepoCoordinates) -> Result<()> {
        if coords.host != HostKind::GitHub {
            return Err(CodehostError::UnsupportedHost(
                coords.host.domain().to_string(),
            ));
        }
        Ok(())
    }

    fn get(&self, url: &str, accept: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.get(url).header(header::ACCEPT, accept);
        if let Some(token) = &self.token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        request
    }

    fn checked(&self, response: reqwest::Response, url: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            return Err(CodehostError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}
