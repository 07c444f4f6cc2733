use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{AnnotationOracle, parse};
use crate::types::RawCandidate;

const MAX_OUTPUT_TOKENS: u32 = 16_000;

const SYSTEM_PROMPT: &str =
    "You are a vocabulary analyst for language learners. Output only valid JSON.";

const PROMPT_HEADER: &str = r#"You are an expert language coach. Identify expressions in the transcript below that are valuable for professionals learning the transcript's language, and classify each by its register.

Register tags:
- "general_spoken": natural in any casual or semi-formal conversation (e.g. "figure out", "no worries")
- "professional_spoken": used in meetings and professional settings (e.g. "circle back", "move the needle")
- "regional_cultural": specific to a country or culture; name the region in the translation
- "formal_written": grammatically correct but stilted in speech (e.g. "utilize", "henceforth")

For each expression return an object with:
- "segment_index": the number shown in [brackets] before the segment text, exactly as shown
- "phrase": the EXACT text as it appears in the segment (used for string matching)
- "register": one of the four tags above
- "level": CEFR difficulty ("A2", "B1", "B2", or "C1")
- "frequency": spoken frequency ("very_high", "high", "medium", or "low")
- "translation": a one-sentence translation plus usage note for the learner
- "alternative": what a basic learner would say instead, or null

Rules:
- Respond with a single complete JSON array and nothing else.
- Escape double quotes inside string values; no line breaks inside values; no trailing comma.
- Scan every segment from start to end; do not stop early.
- Skip basic A1 vocabulary; phrasal verbs are especially valuable.

Transcript (numbered segments):
"#;

/// Which wire shape a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

/// One provider in the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Remote LLM oracle with an ordered provider fallback chain.
///
/// Providers are tried in order until one returns a response; the first
/// successful response is parsed into candidates. Per-call timeouts live on
/// the HTTP client; the scheduler owns retries.
pub struct RemoteLlmOracle {
    client: reqwest::Client,
    providers: Vec<ProviderConfig>,
}

impl RemoteLlmOracle {
    pub fn new(providers: Vec<ProviderConfig>, timeout: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !providers.is_empty(),
            "at least one LLM provider must be configured"
        );
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, providers })
    }

    async fn complete(&self, provider: &ProviderConfig, prompt: &str) -> anyhow::Result<String> {
        match provider.kind {
            ProviderKind::OpenAi => self.complete_openai(provider, prompt).await,
            ProviderKind::Anthropic => self.complete_anthropic(provider, prompt).await,
            ProviderKind::Gemini => self.complete_gemini(provider, prompt).await,
        }
    }

    async fn complete_openai(&self, provider: &ProviderConfig, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{}/v1/chat/completions", base_url(provider));
        let payload = json!({
            "model": provider.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "max_tokens": MAX_OUTPUT_TOKENS,
        });
        let body = self
            .post_json(self.client.post(&url).bearer_auth(&provider.api_key), &payload)
            .await?;
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("OpenAI response missing message content"))
    }

    async fn complete_anthropic(
        &self,
        provider: &ProviderConfig,
        prompt: &str,
    ) -> anyhow::Result<String> {
        let url = format!("{}/v1/messages", base_url(provider));
        let payload = json!({
            "model": provider.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "system": SYSTEM_PROMPT,
            "messages": [{"role": "user", "content": prompt}],
        });
        let request = self
            .client
            .post(&url)
            .header("x-api-key", &provider.api_key)
            .header("anthropic-version", "2023-06-01");
        let body = self.post_json(request, &payload).await?;
        body.pointer("/content/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Anthropic response missing text content"))
    }

    async fn complete_gemini(&self, provider: &ProviderConfig, prompt: &str) -> anyhow::Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            base_url(provider),
            provider.model,
            provider.api_key
        );
        let payload = json!({
            "systemInstruction": {"parts": [{"text": SYSTEM_PROMPT}]},
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {"maxOutputTokens": MAX_OUTPUT_TOKENS},
        });
        let body = self.post_json(self.client.post(&url), &payload).await?;
        body.pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Gemini response missing candidate text"))
    }

    async fn post_json(
        &self,
        request: reqwest::RequestBuilder,
        payload: &Value,
    ) -> anyhow::Result<Value> {
        let response = request.json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("provider returned {}: {}", status, truncate(&detail, 200));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AnnotationOracle for RemoteLlmOracle {
    async fn classify(&self, indexed_text: &str) -> anyhow::Result<Vec<RawCandidate>> {
        let prompt = format!("{PROMPT_HEADER}{indexed_text}");

        let mut errors = Vec::new();
        for provider in &self.providers {
            match self.complete(provider, &prompt).await {
                Ok(raw) => {
                    debug!(
                        provider = provider.kind.as_str(),
                        model = %provider.model,
                        "Oracle completion received"
                    );
                    let candidates = parse::parse_candidates(&raw).map_err(|e| {
                        anyhow::anyhow!(
                            "{}/{} returned unusable output: {}",
                            provider.kind.as_str(),
                            provider.model,
                            e
                        )
                    })?;
                    return Ok(candidates);
                }
                Err(e) => {
                    warn!(
                        provider = provider.kind.as_str(),
                        model = %provider.model,
                        %e,
                        "Provider call failed, trying next"
                    );
                    errors.push(format!(
                        "{}/{}: {}",
                        provider.kind.as_str(),
                        provider.model,
                        truncate(&e.to_string(), 150)
                    ));
                }
            }
        }
        anyhow::bail!("all providers failed: {}", errors.join("; "))
    }

    fn name(&self) -> &str {
        "remote_llm"
    }
}

fn base_url(provider: &ProviderConfig) -> &str {
    provider
        .base_url
        .as_deref()
        .map(|url| url.trim_end_matches('/'))
        .unwrap_or_else(|| provider.kind.default_base_url())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}
