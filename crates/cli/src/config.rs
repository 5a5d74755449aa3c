use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use repoguard_codehost::HostConfig;
use repoguard_detect::{DiscoveryConfig, ReasoningConfig, SignalWeights, SCAN_REPORT_THRESHOLD};
use repoguard_ledger::{LedgerConfig, ADMISSION_THRESHOLD};
use serde::Deserialize;

/// Everything the binary can be configured with, mirroring the TOML file:
///
/// ```toml
/// actor = "alice"
///
/// [github]
/// token = "ghp_..."
///
/// [scan]
/// max_candidates = 10
/// ```
///
/// Every field has a default, so a partial file (or no file at all) works.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default acting account for commands that need one.
    pub actor: Option<String>,
    pub github: GithubSection,
    pub ledger: LedgerSection,
    pub scan: ScanSection,
    pub weights: SignalWeights,
    pub reasoning: ReasoningSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubSection {
    /// Personal access token; `REPOGUARD_GITHUB_TOKEN` / `GITHUB_TOKEN`
    /// override an absent value.
    pub token: Option<String>,
    pub api_root: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub cache_entries: usize,
}

impl Default for GithubSection {
    fn default() -> Self {
        let host = HostConfig::default();
        Self {
            token: None,
            api_root: host.api_root,
            user_agent: host.user_agent,
            timeout_secs: host.timeout_secs,
            cache_entries: host.cache_entries,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// Snapshot location; the `--ledger` flag and `REPOGUARD_LEDGER` win
    /// over this.
    pub path: Option<PathBuf>,
    /// Account allowed to moderate any violation besides the owner.
    pub authority: Option<String>,
    pub admission_threshold: u8,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            path: None,
            authority: None,
            admission_threshold: ADMISSION_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    pub page_size: usize,
    pub max_candidates: usize,
    pub min_provisional_score: f32,
    pub request_delay_ms: u64,
    /// Findings above this composite are filed when `scan --submit` runs.
    pub report_threshold: f32,
}

impl Default for ScanSection {
    fn default() -> Self {
        let discovery = DiscoveryConfig::default();
        Self {
            page_size: discovery.page_size,
            max_candidates: discovery.max_candidates,
            min_provisional_score: discovery.min_provisional_score,
            request_delay_ms: discovery.request_delay.as_millis() as u64,
            report_threshold: SCAN_REPORT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReasoningSection {
    /// Ask the configured model to assess each comparison.
    pub enabled: bool,
    #[serde(flatten)]
    pub provider: ReasoningConfig,
}

impl AppConfig {
    /// Loads the config from `path` when given, else from the default
    /// location if a file exists there, else the built-in defaults. An
    /// explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Token precedence: config file, then `REPOGUARD_GITHUB_TOKEN`, then
    /// `GITHUB_TOKEN`.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .filter(|token| !token.is_empty())
            .or_else(|| env_var("REPOGUARD_GITHUB_TOKEN"))
            .or_else(|| env_var("GITHUB_TOKEN"))
    }

    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            user_agent: self.github.user_agent.clone(),
            timeout_secs: self.github.timeout_secs,
            token: self.github_token(),
            api_root: self.github.api_root.clone(),
            cache_entries: self.github.cache_entries,
        }
    }

    /// Snapshot precedence: `--ledger` flag, then `REPOGUARD_LEDGER`, then
    /// the config file, then `<data dir>/repoguard/ledger.json`.
    pub fn ledger_path(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| env_var("REPOGUARD_LEDGER").map(PathBuf::from))
            .or_else(|| self.ledger.path.clone())
            .unwrap_or_else(default_ledger_path)
    }

    pub fn ledger_config(&self, snapshot_path: PathBuf) -> LedgerConfig {
        LedgerConfig {
            snapshot_path: Some(snapshot_path),
            authority: self.ledger.authority.clone(),
            admission_threshold: self.ledger.admission_threshold,
        }
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            page_size: self.scan.page_size,
            max_candidates: self.scan.max_candidates,
            min_provisional_score: self.scan.min_provisional_score,
            request_delay: Duration::from_millis(self.scan.request_delay_ms),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("repoguard").join("config.toml"))
}

fn default_ledger_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("repoguard").join("ledger.json"))
        .unwrap_or_else(|| PathBuf::from("repoguard-ledger.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_mirror_the_library_constants() {
        let config = AppConfig::default();
        assert_eq!(config.ledger.admission_threshold, 70);
        assert_eq!(config.scan.report_threshold, 0.7);
        assert_eq!(config.scan.max_candidates, 20);
        assert_eq!(config.scan.request_delay_ms, 1000);
        assert_eq!(config.weights.content, 0.4);
        assert!(!config.reasoning.enabled);
        assert_eq!(config.github.api_root, "https://api.github.com");
        assert!(config.actor.is_none());
    }

    #[test]
    fn a_partial_file_overrides_only_what_it_names() {
        let raw = r#"
            actor = "alice"

            [github]
            token = "tok"
            timeout_secs = 5

            [scan]
            max_candidates = 7

            [ledger]
            admission_threshold = 50

            [weights]
            content = 0.7

            [reasoning]
            enabled = true
            model = "qwen-coder"
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.actor.as_deref(), Some("alice"));
        assert_eq!(config.github.token.as_deref(), Some("tok"));
        assert_eq!(config.github.timeout_secs, 5);
        assert_eq!(config.github.user_agent, GithubSection::default().user_agent);
        assert_eq!(config.scan.max_candidates, 7);
        assert_eq!(config.scan.page_size, 30);
        assert_eq!(config.ledger.admission_threshold, 50);
        assert_eq!(config.weights.content, 0.7);
        assert_eq!(config.weights.structure, 0.3);
        assert!(config.reasoning.enabled);
        assert_eq!(config.reasoning.provider.model, "qwen-coder");
        assert_eq!(config.reasoning.provider.base_url, "http://localhost:1234");
    }

    #[test]
    fn an_explicit_missing_config_path_is_an_error() {
        let missing = Path::new("/nonexistent/repoguard.toml");
        assert!(AppConfig::load(Some(missing)).is_err());
    }

    #[test]
    fn the_ledger_flag_beats_every_other_source() {
        std::env::remove_var("REPOGUARD_LEDGER");
        let config = AppConfig {
            ledger: LedgerSection {
                path: Some(PathBuf::from("/cfg/ledger.json")),
                ..LedgerSection::default()
            },
            ..AppConfig::default()
        };
        assert_eq!(
            config.ledger_path(Some(PathBuf::from("/flag/ledger.json"))),
            PathBuf::from("/flag/ledger.json")
        );
        assert_eq!(config.ledger_path(None), PathBuf::from("/cfg/ledger.json"));
    }
}
