use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use subtext_annotation::cache::{AnnotationCache, MemoryCache};
use subtext_annotation::oracle::AnnotationOracle;
use subtext_annotation::oracle::lexicon::LexiconOracle;
use subtext_annotation::oracle::remote_llm::{ProviderConfig, ProviderKind, RemoteLlmOracle};
use subtext_config::AppConfig;

use crate::cache_redis::RedisCache;

/// Builds the configured oracle backend by name.
pub fn build_oracle(config: &AppConfig) -> anyhow::Result<Arc<dyn AnnotationOracle>> {
    match config.oracle.backend.as_str() {
        "remote_llm" => {
            let providers = config
                .oracle
                .providers
                .iter()
                .map(|p| {
                    Ok(ProviderConfig {
                        kind: parse_kind(&p.kind)?,
                        model: p.model.clone(),
                        api_key: p.api_key.clone(),
                        base_url: p.base_url.clone(),
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let oracle = RemoteLlmOracle::new(
                providers,
                Duration::from_secs(config.oracle.timeout_secs),
            )?;
            info!(providers = config.oracle.providers.len(), "Remote LLM oracle configured");
            Ok(Arc::new(oracle))
        }
        "lexicon" => {
            let dir = config
                .oracle
                .lexicon_dir
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("lexicon backend requires oracle.lexicon_dir"))?;
            let oracle = LexiconOracle::from_dir(dir)?;
            Ok(Arc::new(oracle))
        }
        other => anyhow::bail!("unknown oracle backend '{other}'"),
    }
}

fn parse_kind(kind: &str) -> anyhow::Result<ProviderKind> {
    match kind {
        "openai" => Ok(ProviderKind::OpenAi),
        "anthropic" => Ok(ProviderKind::Anthropic),
        "gemini" => Ok(ProviderKind::Gemini),
        other => anyhow::bail!("unknown provider kind '{other}'"),
    }
}

/// Builds the annotation cache: Redis when configured, otherwise in-process.
pub async fn build_cache(config: &AppConfig) -> anyhow::Result<Arc<dyn AnnotationCache>> {
    match config.cache.redis_url.as_deref() {
        Some(url) => Ok(Arc::new(RedisCache::connect(url).await?)),
        None => {
            info!("No Redis configured, using in-process cache");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}
