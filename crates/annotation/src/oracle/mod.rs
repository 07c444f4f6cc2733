pub mod lexicon;
pub mod parse;

#[cfg(feature = "remote-llm")]
pub mod remote_llm;

use async_trait::async_trait;

use crate::types::RawCandidate;

/// Trait for pluggable annotation oracles.
///
/// An oracle receives one indexed transcript chunk (`[global_index] text`
/// lines) and returns approximate annotation candidates. Failures are
/// generic; retrying is the scheduler's responsibility, never the oracle's.
#[async_trait]
pub trait AnnotationOracle: Send + Sync + 'static {
    /// Classifies an indexed chunk into annotation candidates.
    async fn classify(&self, indexed_text: &str) -> anyhow::Result<Vec<RawCandidate>>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}
