use serde::{Deserialize, Serialize};

/// Tuning for the annotation pipeline. Every field has a serde default so
/// partial overrides from layered configuration deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Paragraphs cut at the sentence boundary that crosses this length.
    pub soft_paragraph_chars: usize,
    /// Forced cut length when the stream carries no sentence punctuation.
    pub hard_paragraph_chars: usize,
    /// Maximum paragraphs per chunk when chunks follow chapter boundaries.
    pub chapter_chunk_size: usize,
    /// Chunk size when no chapters are supplied.
    pub flat_chunk_size: usize,
    /// Maximum simultaneous oracle calls.
    pub max_concurrency: usize,
    /// Oracle attempts per chunk before the chunk is marked failed.
    pub max_attempts: u32,
    /// Base delay between retry attempts in milliseconds (jittered).
    pub retry_backoff_ms: u64,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            soft_paragraph_chars: 200,
            hard_paragraph_chars: 500,
            chapter_chunk_size: 20,
            flat_chunk_size: 50,
            max_concurrency: 4,
            max_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}
