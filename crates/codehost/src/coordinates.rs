use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CodehostError, Result};

/// Matches a repository page URL on one of the supported hosts and captures
/// the domain, owner and repository name. Trailing `.git`, extra path
/// segments, query strings and fragments are dropped.
static REPO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^https?://(?:www\.)?(github\.com|gitlab\.com|bitbucket\.org)/([^/?#]+)/([^/?#]+?)(?:\.git)?(?:[/?#].*)?$",
    )
    .expect("repository URL pattern")
});

static DOMAIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://(?:www\.)?([^/?#]+)").expect("domain pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    GitHub,
    GitLab,
    Bitbucket,
}

impl HostKind {
    pub fn domain(self) -> &'static str {
        match self {
            HostKind::GitHub => "github.com",
            HostKind::GitLab => "gitlab.com",
            HostKind::Bitbucket => "bitbucket.org",
        }
    }

    fn from_domain(domain: &str) -> Option<Self> {
        match domain {
            "github.com" => Some(HostKind::GitHub),
            "gitlab.com" => Some(HostKind::GitLab),
            "bitbucket.org" => Some(HostKind::Bitbucket),
            _ => None,
        }
    }
}

/// Owner and repository name on a specific code host, extracted from any of
/// the URL shapes users paste (scheme optional, `www.` prefix, trailing
/// `.git`, deep links into the repository).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoCoordinates {
    pub host: HostKind,
    pub owner: String,
    pub name: String,
}

impl RepoCoordinates {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CodehostError::InvalidUrl("empty URL".to_string()));
        }

        let url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else if trimmed.starts_with("www.") || trimmed.contains('.') {
            format!("https://{trimmed}")
        } else {
            return Err(CodehostError::InvalidUrl(trimmed.to_string()));
        };

        if let Some(caps) = REPO_RE.captures(&url) {
            let domain = caps[1].to_ascii_lowercase();
            let host = HostKind::from_domain(&domain)
                .ok_or_else(|| CodehostError::UnsupportedHost(domain.clone()))?;
            return Ok(Self {
                host,
                owner: caps[2].to_string(),
                name: caps[3].to_string(),
            });
        }

        match DOMAIN_RE.captures(&url) {
            Some(caps) if HostKind::from_domain(&caps[1].to_ascii_lowercase()).is_some() => Err(
                CodehostError::InvalidUrl(format!("not a repository URL: {trimmed}")),
            ),
            Some(caps) => Err(CodehostError::UnsupportedHost(
                caps[1].to_ascii_lowercase(),
            )),
            None => Err(CodehostError::InvalidUrl(trimmed.to_string())),
        }
    }

    /// Canonical `https://host/owner/name` form used as the identity of a
    /// repository everywhere else in the system.
    pub fn canonical_url(&self) -> String {
        format!("https://{}/{}/{}", self.host.domain(), self.owner, self.name)
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// REST endpoint for repository metadata, where the host exposes one.
    pub fn api_url(&self) -> Option<String> {
        match self.host {
            HostKind::GitHub => Some(format!(
                "https://api.github.com/repos/{}/{}",
                self.owner, self.name
            )),
            HostKind::GitLab => Some(format!(
                "https://gitlab.com/api/v4/projects/{}%2F{}",
                self.owner, self.name
            )),
            HostKind::Bitbucket => None,
        }
    }
}

impl fmt::Display for RepoCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_url())
    }
}
