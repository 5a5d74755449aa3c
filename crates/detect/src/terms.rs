use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use repoguard_codehost::RepoCoordinates;

/// Search terms built from one feature description never exceed this count.
pub const MAX_TERMS: usize = 5;

/// Multi-word camel or Pascal case identifiers, two humps or more.
static CAMEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[A-Z][a-z0-9]+){2,}\b").expect("camel case pattern"));

/// Framework and platform names worth searching for on their own. Scanned as
/// case-insensitive substrings of the feature text.
const PLATFORM_VOCABULARY: &[&str] = &[
    "react",
    "vue",
    "angular",
    "svelte",
    "nextjs",
    "django",
    "flask",
    "fastapi",
    "rails",
    "laravel",
    "spring",
    "express",
    "flutter",
    "tokio",
    "tensorflow",
    "pytorch",
    "kubernetes",
    "docker",
    "terraform",
    "graphql",
    "grpc",
    "websocket",
    "blockchain",
    "ethereum",
    "solidity",
    "filecoin",
    "ipfs",
    "smart contract",
    "machine learning",
    "neural network",
];

/// Turns a free-text feature description into at most [`MAX_TERMS`] search
/// terms: camel-case identifiers in document order, then vocabulary hits,
/// deduplicated case-insensitively. A description that yields fewer than two
/// terms falls back to searching for the repository itself.
pub struct QueryBuilder {
    vocabulary: &'static [&'static str],
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            vocabulary: PLATFORM_VOCABULARY,
        }
    }

    pub fn build(&self, features: &str, target: &RepoCoordinates) -> Vec<String> {
        if features.trim().is_empty() {
            return Vec::new();
        }

        let camel = CAMEL_RE
            .find_iter(features)
            .map(|m| m.as_str().to_string());
        let lowered = features.to_lowercase();
        let vocabulary = self
            .vocabulary
            .iter()
            .filter(|keyword| lowered.contains(*keyword))
            .map(|keyword| (*keyword).to_string());

        let mut terms: Vec<String> = camel
            .chain(vocabulary)
            .unique_by(|term| term.to_ascii_lowercase())
            .take(MAX_TERMS)
            .collect();

        if terms.len() < 2 {
            let fallback = format!("{} {}", target.owner, target.name);
            if !terms
                .iter()
                .any(|term| term.eq_ignore_ascii_case(&fallback))
            {
                terms.push(fallback);
            }
        }
        terms
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
