use std::sync::Arc;

use repoguard_codehost::{HostClient, RepoCoordinates};
use serde::{Deserialize, Serialize};

use crate::compare::{Comparator, ComparisonReport};
use crate::discovery::{Candidate, Discoverer};
use crate::error::Result;
use crate::terms::QueryBuilder;

/// Composite score above which a finding is worth filing with the ledger.
pub const SCAN_REPORT_THRESHOLD: f32 = 0.7;

/// One compared candidate with its full report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFinding {
    pub candidate: Candidate,
    pub report: ComparisonReport,
}

/// Runs the whole pipeline for one protected repository: build terms,
/// discover candidates, compare each one. Findings keep every compared
/// candidate so callers can apply their own filing threshold.
pub struct ScanRunner {
    client: Arc<HostClient>,
    builder: QueryBuilder,
    discoverer: Discoverer,
    comparator: Comparator,
}

impl ScanRunner {
    pub fn new(client: Arc<HostClient>, discoverer: Discoverer, comparator: Comparator) -> Self {
        Self {
            client,
            builder: QueryBuilder::new(),
            discoverer,
            comparator,
        }
    }

    pub async fn scan(&mut self, target_url: &str, key_features: &str) -> Result<Vec<ScanFinding>> {
        let target = RepoCoordinates::parse(target_url)?;
        let terms = self.builder.build(key_features, &target);
        if terms.is_empty() {
            log::info!("no usable search terms for {target}, skipping discovery");
            return Ok(Vec::new());
        }
        log::info!("scanning {target} with terms {terms:?}");

        let target_analysis = self.client.analyze(&target).await?;
        let candidates = self.discoverer.discover(&target, &terms).await;
        log::info!("{} candidates to compare against {target}", candidates.len());

        let mut findings = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let coords = match RepoCoordinates::parse(&candidate.url) {
                Ok(coords) => coords,
                Err(err) => {
                    log::warn!("skipping candidate {}: {err}", candidate.url);
                    continue;
                }
            };
            let report = self
                .comparator
                .compare_with_analyses(&target, &coords, Some(&target_analysis), None)
                .await;
            log::debug!("{} scored {:.2}", candidate.url, report.composite);
            findings.push(ScanFinding { candidate, report });
        }

        findings.sort_by(|a, b| {
            b.report
                .composite
                .partial_cmp(&a.report.composite)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(findings)
    }
}

/// Plain-language tier for a composite score, for scan output and reports.
pub fn recommendation(composite: f32) -> &'static str {
    if composite > 0.8 {
        "High similarity: likely a derived copy. File a violation report and prepare a takedown notice."
    } else if composite > 0.6 {
        "Moderate similarity: manual review recommended before filing."
    } else if composite > 0.4 {
        "Low similarity: some overlap, likely independent work."
    } else {
        "Minimal similarity: no action needed."
    }
}
