use std::collections::HashSet;
use std::sync::Arc;

use repoguard_codehost::{HostClient, RepoAnalysis, RepoCoordinates};
use serde::{Deserialize, Serialize};

use crate::reasoning::{AssessmentRequest, ReasoningProvider};
use crate::similarity::{
    composite, is_source_file, language_match, normalize_source, size_ratio,
    structure_similarity, token_ratio, SignalWeights, PAIR_EVIDENCE_THRESHOLD,
    SIZE_EVIDENCE_THRESHOLD, STRUCTURE_EVIDENCE_THRESHOLD,
};

/// At most this many same-named files are fetched and compared per pair of
/// repositories.
pub const MAX_PAIRED_FILES: usize = 10;
/// Per-file download cap in bytes.
pub const CONTENT_BYTE_CAP: usize = 10 * 1024;

/// The outcome of comparing one candidate against the original: the four
/// signals, their weighted composite, and human-readable evidence lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub structure_similarity: f32,
    pub content_similarity: f32,
    pub language_match: f32,
    pub size_ratio: f32,
    pub composite: f32,
    pub evidence: Vec<String>,
}

/// Compares two repositories. Fetch failures degrade the affected signals to
/// zero instead of failing the comparison; a report always comes back.
pub struct Comparator {
    client: Arc<HostClient>,
    weights: SignalWeights,
    reasoning: Option<Arc<dyn ReasoningProvider>>,
    max_paired_files: usize,
    content_byte_cap: usize,
}

impl Comparator {
    pub fn new(client: Arc<HostClient>, weights: SignalWeights) -> Self {
        Self {
            client,
            weights,
            reasoning: None,
            max_paired_files: MAX_PAIRED_FILES,
            content_byte_cap: CONTENT_BYTE_CAP,
        }
    }

    pub fn with_reasoning(mut self, provider: Arc<dyn ReasoningProvider>) -> Self {
        self.reasoning = Some(provider);
        self
    }

    pub async fn compare(&self, a: &RepoCoordinates, b: &RepoCoordinates) -> ComparisonReport {
        self.compare_with_analyses(a, b, None, None).await
    }

    /// Like [`Comparator::compare`], reusing analyses the caller already has.
    /// A scan fetches the protected repository once and passes it here for
    /// every candidate.
    pub async fn compare_with_analyses(
        &self,
        a: &RepoCoordinates,
        b: &RepoCoordinates,
        a_analysis: Option<&RepoAnalysis>,
        b_analysis: Option<&RepoAnalysis>,
    ) -> ComparisonReport {
        let fetched_a = match a_analysis {
            Some(_) => None,
            None => self.fetch(a).await,
        };
        let fetched_b = match b_analysis {
            Some(_) => None,
            None => self.fetch(b).await,
        };
        let a_analysis = a_analysis.or(fetched_a.as_ref());
        let b_analysis = b_analysis.or(fetched_b.as_ref());

        let mut report = ComparisonReport::default();
        if let (Some(left), Some(right)) = (a_analysis, b_analysis) {
            report.language_match =
                language_match(left.language.as_deref(), right.language.as_deref());
            report.size_ratio = size_ratio(left.size_kb, right.size_kb);
            report.structure_similarity =
                structure_similarity(&left.top_level_files, &right.top_level_files);

            let (content, mut pair_evidence) = self.content_signal(a, b, left, right).await;
            report.content_similarity = content;

            if report.structure_similarity > STRUCTURE_EVIDENCE_THRESHOLD {
                report.evidence.push(format!(
                    "Top-level structure overlap {:.0}%",
                    report.structure_similarity * 100.0
                ));
            }
            report.evidence.append(&mut pair_evidence);
            if report.language_match == 1.0 {
                if let Some(language) = &left.language {
                    report
                        .evidence
                        .push(format!("Same primary language: {language}"));
                }
            }
            if report.size_ratio >= SIZE_EVIDENCE_THRESHOLD {
                report.evidence.push(format!(
                    "Repository sizes within {:.0}% of each other",
                    report.size_ratio * 100.0
                ));
            }
        }
        report.composite = composite(
            &self.weights,
            report.structure_similarity,
            report.content_similarity,
            report.language_match,
            report.size_ratio,
        );

        if let Some(provider) = &self.reasoning {
            let request = AssessmentRequest {
                original_url: a.canonical_url(),
                candidate_url: b.canonical_url(),
                composite: report.composite,
                evidence: report.evidence.clone(),
            };
            match provider.assess(&request).await {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        report.evidence.push(format!("Assessment: {text}"));
                    }
                }
                Err(err) => {
                    log::warn!("reasoning provider {} failed: {err}", provider.name());
                }
            }
        }
        report
    }

    async fn fetch(&self, coords: &RepoCoordinates) -> Option<RepoAnalysis> {
        match self.client.analyze(coords).await {
            Ok(analysis) => Some(analysis),
            Err(err) => {
                log::warn!("analysis of {coords} failed: {err}");
                None
            }
        }
    }

    /// Mean content ratio over same-named source files, capped at
    /// `max_paired_files` pairs in sorted name order. A pair whose fetch
    /// fails on either side drops out of the average.
    async fn content_signal(
        &self,
        a: &RepoCoordinates,
        b: &RepoCoordinates,
        left: &RepoAnalysis,
        right: &RepoAnalysis,
    ) -> (f32, Vec<String>) {
        let right_names: HashSet<&str> = right.top_level_files.iter().map(String::as_str).collect();
        let mut shared: Vec<&str> = left
            .top_level_files
            .iter()
            .map(String::as_str)
            .filter(|name| right_names.contains(*name) && is_source_file(name))
            .collect();
        shared.sort_unstable();
        shared.dedup();
        shared.truncate(self.max_paired_files);

        let mut ratios: Vec<f32> = Vec::new();
        let mut evidence: Vec<String> = Vec::new();
        for name in shared {
            let left_text = match self.client.file_text(a, name, self.content_byte_cap).await {
                Ok(text) => text,
                Err(err) => {
                    log::warn!("fetching {name} from {a} failed: {err}");
                    continue;
                }
            };
            let right_text = match self.client.file_text(b, name, self.content_byte_cap).await {
                Ok(text) => text,
                Err(err) => {
                    log::warn!("fetching {name} from {b} failed: {err}");
                    continue;
                }
            };
            let ratio = token_ratio(
                &normalize_source(&left_text),
                &normalize_source(&right_text),
            );
            if ratio >= PAIR_EVIDENCE_THRESHOLD {
                evidence.push(format!("File {name} matches {:.0}%", ratio * 100.0));
            }
            ratios.push(ratio);
        }

        if ratios.is_empty() {
            (0.0, evidence)
        } else {
            (ratios.iter().sum::<f32>() / ratios.len() as f32, evidence)
        }
    }
}
