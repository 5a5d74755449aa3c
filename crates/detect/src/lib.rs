//! Derivative-repository detection: search-term extraction, candidate
//! discovery across a code host, weighted similarity comparison, and an
//! optional reasoning-model assessment of the numeric evidence.

mod compare;
mod discovery;
mod error;
mod reasoning;
mod scan;
mod terms;

pub mod similarity;

pub use compare::{Comparator, ComparisonReport, CONTENT_BYTE_CAP, MAX_PAIRED_FILES};
pub use discovery::{Candidate, Discoverer, DiscoveryConfig, RepoSearch};
pub use error::{DetectError, Result};
pub use reasoning::{AssessmentRequest, OpenAiCompatProvider, ReasoningConfig, ReasoningProvider};
pub use scan::{recommendation, ScanFinding, ScanRunner, SCAN_REPORT_THRESHOLD};
pub use similarity::SignalWeights;
pub use terms::{QueryBuilder, MAX_TERMS};
