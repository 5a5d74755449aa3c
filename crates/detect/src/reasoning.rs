use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the comparator hands a reasoning service: both repository URLs, the
/// numeric verdict so far, and the evidence lines behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub original_url: String,
    pub candidate_url: String,
    pub composite: f32,
    pub evidence: Vec<String>,
}

/// Optional judgement layer over the numeric signals. Failures are absorbed
/// by the caller; an implementation can be slow or flaky without affecting
/// the comparison result.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn assess(&self, request: &AssessmentRequest) -> anyhow::Result<String>;
}

/// Connection settings for [`OpenAiCompatProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234".to_string(),
            model: "local".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// Talks to any OpenAI-compatible `/v1/chat/completions` endpoint, local or
/// hosted.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(config: &ReasoningConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building reasoning HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn prompt(request: &AssessmentRequest) -> String {
        let mut prompt = format!(
            "Two repositories are being compared for potential code plagiarism.\n\
             Original: {}\n\
             Candidate: {}\n\
             Composite similarity: {:.2}\n",
            request.original_url, request.candidate_url, request.composite
        );
        if !request.evidence.is_empty() {
            prompt.push_str("Evidence:\n");
            for line in &request.evidence {
                prompt.push_str("- ");
                prompt.push_str(line);
                prompt.push('\n');
            }
        }
        prompt.push_str(
            "In at most two sentences, state how likely the candidate derives from the original and why.",
        );
        prompt
    }
}

#[async_trait]
impl ReasoningProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn assess(&self, request: &AssessmentRequest) -> anyhow::Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a code-provenance analyst. Answer concisely.",
                },
                {
                    "role": "user",
                    "content": Self::prompt(request),
                },
            ],
            "temperature": 0.2,
            "max_tokens": 200,
        });

        let mut http_request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }
        let response = http_request
            .send()
            .await
            .with_context(|| format!("posting to {url}"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{url} returned status {status}");
        }
        let payload: serde_json::Value = response
            .json()
            .await
            .context("decoding completion payload")?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        if content.is_empty() {
            anyhow::bail!("empty completion from model {}", self.model);
        }
        Ok(content)
    }
}
