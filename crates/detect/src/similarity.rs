//! The four similarity signals and their composite. All functions here are
//! pure so the scoring model can be exercised without a network.

use std::collections::{HashMap, HashSet};

use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32String};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// File extensions eligible for content pairing.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "c", "cc", "cpp", "cs", "go", "h", "hpp", "java", "js", "jsx", "kt", "lua", "m", "php", "pl",
    "py", "rb", "rs", "scala", "sh", "sol", "swift", "ts", "tsx",
];

/// Structure overlap above this produces an evidence line.
pub const STRUCTURE_EVIDENCE_THRESHOLD: f32 = 0.5;
/// Per-file content ratio at or above this produces an evidence line.
pub const PAIR_EVIDENCE_THRESHOLD: f32 = 0.8;
/// Size ratio at or above this produces an evidence line.
pub const SIZE_EVIDENCE_THRESHOLD: f32 = 0.9;

static BLOCK_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern"));

/// Weights of the composite score. The defaults favor content overlap, then
/// shared structure, with language and size as weak corroboration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub structure: f32,
    pub content: f32,
    pub language: f32,
    pub size: f32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            structure: 0.3,
            content: 0.4,
            language: 0.2,
            size: 0.1,
        }
    }
}

/// 1.0 when both sides report the same primary language, comparing labels
/// exactly; anything else, including one side unknown, is 0.0.
pub fn language_match(a: Option<&str>, b: Option<&str>) -> f32 {
    match (a, b) {
        (Some(left), Some(right)) if left == right => 1.0,
        _ => 0.0,
    }
}

/// Smaller size over larger size. Zero when either side reports zero, so an
/// empty repository never looks like a perfect size match.
pub fn size_ratio(a: u64, b: u64) -> f32 {
    if a == 0 || b == 0 {
        return 0.0;
    }
    a.min(b) as f32 / a.max(b) as f32
}

/// Jaccard overlap of two top-level file name sets.
pub fn structure_similarity(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let left: HashSet<&str> = a.iter().map(String::as_str).collect();
    let right: HashSet<&str> = b.iter().map(String::as_str).collect();
    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Strips `/* */`, `//` and `#` comments and collapses whitespace runs into
/// single spaces. Comment markers inside string literals are not recognized;
/// both sides of a comparison lose the same text, which is all the ratio
/// needs.
pub fn normalize_source(text: &str) -> String {
    let without_blocks = BLOCK_COMMENT_RE.replace_all(text, " ");
    let mut kept = String::with_capacity(without_blocks.len());
    for line in without_blocks.lines() {
        let line = match line.find("//") {
            Some(index) => &line[..index],
            None => line,
        };
        let line = match line.find('#') {
            Some(index) => &line[..index],
            None => line,
        };
        kept.push_str(line);
        kept.push('\n');
    }
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Token-multiset similarity of two normalized documents:
/// `2·Σ min(count_a, count_b) / (tokens_a + tokens_b)`. Two empty documents
/// count as identical.
pub fn token_ratio(a: &str, b: &str) -> f32 {
    fn count(text: &str) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for token in text.split_whitespace() {
            *counts.entry(token).or_default() += 1;
        }
        counts
    }
    let left = count(a);
    let right = count(b);
    let total: usize = left.values().sum::<usize>() + right.values().sum::<usize>();
    if total == 0 {
        return 1.0;
    }
    let overlap: usize = left
        .iter()
        .map(|(token, count)| (*count).min(right.get(token).copied().unwrap_or(0)))
        .sum();
    (2 * overlap) as f32 / total as f32
}

/// Weighted sum of the four signals, clamped to [0,1].
pub fn composite(
    weights: &SignalWeights,
    structure: f32,
    content: f32,
    language: f32,
    size: f32,
) -> f32 {
    let score = weights.structure * structure
        + weights.content * content
        + weights.language * language
        + weights.size * size;
    score.clamp(0.0, 1.0)
}

/// Fuzzy-match affinity between two names in [0,1], normalized by the score
/// the query earns against itself. No match at all is 0.0.
pub fn name_affinity(matcher: &mut Matcher, query: &str, subject: &str) -> f32 {
    let pattern = Pattern::parse(
        &query.to_lowercase(),
        CaseMatching::Ignore,
        Normalization::Smart,
    );
    let subject_haystack = Utf32String::from(subject.to_lowercase());
    let self_haystack = Utf32String::from(query.to_lowercase());
    let score = pattern
        .score(subject_haystack.slice(..), matcher)
        .map(|s| s as f32)
        .unwrap_or(0.0);
    let self_score = pattern
        .score(self_haystack.slice(..), matcher)
        .map(|s| s as f32)
        .unwrap_or(0.0);
    if self_score <= 0.0 {
        return 0.0;
    }
    (score / self_score).clamp(0.0, 1.0)
}

/// True when the file name carries one of the [`SOURCE_EXTENSIONS`].
pub fn is_source_file(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, extension)| SOURCE_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
