use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nucleo_matcher::{Config, Matcher};
use repoguard_codehost::{HostClient, RepoCoordinates, SearchHit};
use serde::{Deserialize, Serialize};

use crate::similarity::name_affinity;

/// The search surface discovery runs against. [`HostClient`] provides the
/// real one; tests script their own.
#[async_trait]
pub trait RepoSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        per_page: usize,
    ) -> repoguard_codehost::Result<Vec<SearchHit>>;
}

#[async_trait]
impl RepoSearch for HostClient {
    async fn search(
        &self,
        query: &str,
        per_page: usize,
    ) -> repoguard_codehost::Result<Vec<SearchHit>> {
        self.search_repositories(query, per_page).await
    }
}

/// A repository admitted by discovery, carrying everything later stages and
/// reports need without refetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub url: String,
    pub display_name: String,
    pub description: Option<String>,
    pub stars: u64,
    pub language: Option<String>,
    pub created_at: Option<String>,
    pub provisional_score: f32,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Search page size; only the first page of each term is read.
    pub page_size: usize,
    /// Hard cap on the number of candidates returned.
    pub max_candidates: usize,
    /// Name affinity a hit must exceed to be admitted.
    pub min_provisional_score: f32,
    /// Pause between per-term search requests.
    pub request_delay: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            page_size: 30,
            max_candidates: 20,
            min_provisional_score: 0.3,
            request_delay: Duration::from_secs(1),
        }
    }
}

/// Best-effort candidate discovery. One search request per term, a shared
/// seen-URL set across terms, and a provisional name-affinity gate. A term
/// whose search fails is skipped; when every term fails the result is simply
/// empty.
pub struct Discoverer {
    search: Arc<dyn RepoSearch>,
    matcher: Matcher,
    config: DiscoveryConfig,
}

impl Discoverer {
    pub fn new(search: Arc<dyn RepoSearch>, config: DiscoveryConfig) -> Self {
        Self {
            search,
            matcher: Matcher::new(Config::DEFAULT),
            config,
        }
    }

    pub async fn discover(&mut self, target: &RepoCoordinates, terms: &[String]) -> Vec<Candidate> {
        let target_url = target.canonical_url();
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates: Vec<Candidate> = Vec::new();

        for (index, term) in terms.iter().enumerate() {
            if index > 0 && !self.config.request_delay.is_zero() {
                tokio::time::sleep(self.config.request_delay).await;
            }
            let hits = match self.search.search(term, self.config.page_size).await {
                Ok(hits) => hits,
                Err(err) => {
                    log::warn!("search for {term:?} failed: {err}");
                    continue;
                }
            };
            log::debug!("term {term:?}: {} hits", hits.len());

            for hit in hits {
                let url = canonical_hit_url(&hit);
                if url == target_url || !seen.insert(url.clone()) {
                    continue;
                }
                let score = name_affinity(&mut self.matcher, &target.name, &hit.name);
                if score <= self.config.min_provisional_score {
                    continue;
                }
                candidates.push(Candidate {
                    url,
                    display_name: hit.full_name,
                    description: hit.description,
                    stars: hit.stars,
                    language: hit.language,
                    created_at: hit.created_at,
                    provisional_score: score,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.provisional_score
                .partial_cmp(&a.provisional_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.stars.cmp(&a.stars))
        });
        candidates.truncate(self.config.max_candidates);
        candidates
    }
}

fn canonical_hit_url(hit: &SearchHit) -> String {
    RepoCoordinates::parse(&hit.html_url)
        .map(|coords| coords.canonical_url())
        .unwrap_or_else(|_| hit.html_url.trim_end_matches('/').to_string())
}
