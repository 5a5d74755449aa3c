//! Canonical digests for registration and evidence payloads.
//!
//! Digest inputs are serialized as JSON objects whose keys are emitted in
//! sorted order, so the same fields always produce the same hash no matter
//! how the caller assembled them.

use sha2::{Digest, Sha256};

/// At most this many file names participate in the content hash.
pub const CONTENT_HASH_FILE_CAP: usize = 10;
/// At most this many evidence lines participate in the evidence hash.
pub const EVIDENCE_LINE_CAP: usize = 5;
/// Key feature lists are stored at most this long.
pub const KEY_FEATURE_CAP: usize = 5;
/// Each stored key feature is cut to this many characters.
pub const KEY_FEATURE_CHAR_CAP: usize = 100;

/// Fields that identify a repository's content.
#[derive(Debug, Clone)]
pub struct RepoDigestInput<'a> {
    pub url: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub language: &'a str,
    pub created_at: &'a str,
    pub files: &'a [String],
}

/// Content identity of a repository. Only the first
/// [`CONTENT_HASH_FILE_CAP`] names count; they are sorted after the cap, so
/// order within that prefix does not change the digest.
pub fn content_hash(input: &RepoDigestInput<'_>) -> String {
    let mut files: Vec<&str> = input
        .files
        .iter()
        .take(CONTENT_HASH_FILE_CAP)
        .map(String::as_str)
        .collect();
    files.sort_unstable();
    let canonical = serde_json::json!({
        "url": input.url,
        "name": input.name,
        "description": input.description,
        "language": input.language,
        "created_at": input.created_at,
        "files": files,
    });
    sha256_hex(canonical.to_string().as_bytes())
}

/// Cheap secondary identity derived from immutable repository facts.
pub fn code_fingerprint(url: &str, created_at: &str, size_kb: u64) -> String {
    sha256_hex(format!("{url}:{created_at}:{size_kb}").as_bytes())
}

/// Digest of the evidence attached to a violation claim. Only the first
/// [`EVIDENCE_LINE_CAP`] lines count, in the order the reporter gave them.
pub fn evidence_hash(
    violating_url: &str,
    similarity_score: u8,
    timestamp: u64,
    evidence: &[String],
) -> String {
    let lines: Vec<&str> = evidence
        .iter()
        .take(EVIDENCE_LINE_CAP)
        .map(String::as_str)
        .collect();
    let canonical = serde_json::json!({
        "violating_url": violating_url,
        "similarity_score": similarity_score,
        "timestamp": timestamp,
        "evidence": lines,
    });
    sha256_hex(canonical.to_string().as_bytes())
}

/// Normalizes a key feature list to the stored shape: at most
/// [`KEY_FEATURE_CAP`] entries of at most [`KEY_FEATURE_CHAR_CAP`] characters.
pub fn format_key_features(features: &[String]) -> Vec<String> {
    features
        .iter()
        .take(KEY_FEATURE_CAP)
        .map(|feature| feature.chars().take(KEY_FEATURE_CHAR_CAP).collect())
        .collect()
}

/// Splits free feature text into the stored key-feature shape: one feature
/// per non-blank line, capped like [`format_key_features`].
pub fn key_features_from_text(text: &str) -> Vec<String> {
    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    format_key_features(&lines)
}

/// Converts a [0,1] similarity to the integer percentage the ledger stores.
/// The fraction is dropped and out-of-range values are clamped.
pub fn score_to_int(score: f32) -> u8 {
    (score * 100.0).clamp(0.0, 100.0) as u8
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    to_lower_hex(&hasher.finalize())
}

fn to_lower_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample_input() -> RepoDigestInput<'static> {
        RepoDigestInput {
            url: "https://github.com/acme/widget",
            name: "widget",
            description: "a widget",
            language: "Rust",
            created_at: "2023-05-01T12:00:00Z",
            files: &[],
        }
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn content_hash_ignores_order_within_the_cap() {
        let forward = strings(&["a.rs", "b.rs", "c.rs"]);
        let backward = strings(&["c.rs", "b.rs", "a.rs"]);
        let mut left = sample_input();
        left.files = &forward;
        let mut right = sample_input();
        right.files = &backward;
        assert_eq!(content_hash(&left), content_hash(&right));
    }

    #[test]
    fn content_hash_caps_file_list() {
        let many: Vec<String> = (0..20).map(|i| format!("file{i:02}.rs")).collect();
        let first_ten: Vec<String> = many[..10].to_vec();
        let mut left = sample_input();
        left.files = &many;
        let mut right = sample_input();
        right.files = &first_ten;
        // Entries past the cap never reach the digest.
        assert_eq!(content_hash(&left), content_hash(&right));
    }

    #[test]
    fn content_hash_takes_the_listed_prefix_before_sorting() {
        // 11 names with "zzz.rs" listed first.
        let listed: Vec<String> = std::iter::once("zzz.rs".to_string())
            .chain((0..10).map(|i| format!("file{i:02}.rs")))
            .collect();
        let prefix: Vec<String> = listed[..10].to_vec();
        let mut left = sample_input();
        left.files = &listed;
        let mut right = sample_input();
        right.files = &prefix;
        assert_eq!(content_hash(&left), content_hash(&right));

        // file09.rs sorts ahead of zzz.rs but arrived past the cap.
        let alphabetical_ten: Vec<String> = (0..10).map(|i| format!("file{i:02}.rs")).collect();
        let mut other = sample_input();
        other.files = &alphabetical_ten;
        assert_ne!(content_hash(&left), content_hash(&other));
    }

    #[test]
    fn content_hash_sensitive_to_fields() {
        let base = sample_input();
        let mut renamed = sample_input();
        renamed.name = "gadget";
        assert_ne!(content_hash(&base), content_hash(&renamed));
    }

    #[test]
    fn fingerprint_depends_on_every_part() {
        let base = code_fingerprint("https://github.com/acme/widget", "2023-05-01", 10);
        assert_eq!(
            base,
            code_fingerprint("https://github.com/acme/widget", "2023-05-01", 10)
        );
        assert_ne!(
            base,
            code_fingerprint("https://github.com/acme/widget", "2023-05-01", 11)
        );
        assert_ne!(
            base,
            code_fingerprint("https://github.com/acme/widget", "2023-05-02", 10)
        );
    }

    #[test]
    fn evidence_hash_uses_first_five_lines() {
        let six = strings(&["e1", "e2", "e3", "e4", "e5", "e6"]);
        let five = strings(&["e1", "e2", "e3", "e4", "e5"]);
        assert_eq!(
            evidence_hash("https://github.com/x/y", 80, 1000, &six),
            evidence_hash("https://github.com/x/y", 80, 1000, &five)
        );
        let reordered = strings(&["e2", "e1", "e3", "e4", "e5"]);
        assert_ne!(
            evidence_hash("https://github.com/x/y", 80, 1000, &five),
            evidence_hash("https://github.com/x/y", 80, 1000, &reordered)
        );
    }

    #[test]
    fn key_features_are_capped_and_truncated() {
        let features = vec!["x".repeat(150), "short".to_string()];
        let formatted = format_key_features(&features);
        assert_eq!(formatted.len(), 2);
        assert_eq!(formatted[0].chars().count(), 100);
        assert_eq!(formatted[1], "short");

        let seven: Vec<String> = (0..7).map(|i| format!("f{i}")).collect();
        assert_eq!(format_key_features(&seven).len(), 5);
    }

    #[test]
    fn key_feature_truncation_respects_character_boundaries() {
        let features = vec!["é".repeat(120)];
        let formatted = format_key_features(&features);
        assert_eq!(formatted[0].chars().count(), 100);
        assert_eq!(formatted[0], "é".repeat(100));
    }

    #[test]
    fn feature_text_splits_on_lines_and_drops_blanks() {
        let text = "fast indexing\n\n  fuzzy search  \n\t\nrest api\n";
        assert_eq!(
            key_features_from_text(text),
            strings(&["fast indexing", "fuzzy search", "rest api"])
        );
        assert_eq!(key_features_from_text("   \n\t\n"), Vec::<String>::new());
    }

    #[test]
    fn scores_convert_to_clamped_percentages() {
        assert_eq!(score_to_int(0.0), 0);
        assert_eq!(score_to_int(0.85), 85);
        assert_eq!(score_to_int(0.7), 70);
        // The fraction is dropped, never rounded up.
        assert_eq!(score_to_int(0.855), 85);
        assert_eq!(score_to_int(0.999), 99);
        assert_eq!(score_to_int(1.0), 100);
        assert_eq!(score_to_int(1.7), 100);
        assert_eq!(score_to_int(-0.4), 0);
        assert_eq!(score_to_int(f32::NAN), 0);
    }

    proptest! {
        #[test]
        fn content_hash_is_deterministic(files in proptest::collection::vec("[a-z]{1,12}", 0..15)) {
            let mut left = sample_input();
            left.files = &files;
            let first = content_hash(&left);
            let second = content_hash(&left);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn formatted_features_never_exceed_caps(features in proptest::collection::vec(".{0,200}", 0..10)) {
            let formatted = format_key_features(&features);
            prop_assert!(formatted.len() <= KEY_FEATURE_CAP);
            for feature in &formatted {
                prop_assert!(feature.chars().count() <= KEY_FEATURE_CHAR_CAP);
            }
        }
    }
}
