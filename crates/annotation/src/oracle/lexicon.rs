use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use super::AnnotationOracle;
use crate::types::RawCandidate;

/// One phrase entry from a lexicon file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LexiconEntry {
    pub phrase: String,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub register: Option<String>,
    #[serde(default)]
    pub alternative: Option<String>,
}

/// Offline oracle backed by a static phrase lexicon.
///
/// Matches entries against each indexed segment with word-boundary,
/// case-insensitive containment. Entries are held longest-first so a longer
/// phrase claims its span before any phrase it contains ("time off" before
/// "time").
pub struct LexiconOracle {
    entries: Vec<LexiconEntry>,
}

impl LexiconOracle {
    pub fn new(mut entries: Vec<LexiconEntry>) -> Self {
        entries.retain(|e| !e.phrase.trim().is_empty());
        entries.sort_by_key(|e| std::cmp::Reverse(e.phrase.chars().count()));
        Self { entries }
    }

    /// Loads every `.json` lexicon file in a directory. Unreadable files are
    /// skipped with a warning.
    pub fn from_dir(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)
            .map_err(|e| anyhow::anyhow!("Failed to read lexicon dir '{}': {}", dir.display(), e))?
        {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<Vec<LexiconEntry>>(&content) {
                    Ok(mut parsed) => entries.append(&mut parsed),
                    Err(e) => warn!(file = %path.display(), %e, "Skipping malformed lexicon file"),
                },
                Err(e) => warn!(file = %path.display(), %e, "Skipping unreadable lexicon file"),
            }
        }
        info!(count = entries.len(), dir = %dir.display(), "Lexicon loaded");
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AnnotationOracle for LexiconOracle {
    async fn classify(&self, indexed_text: &str) -> anyhow::Result<Vec<RawCandidate>> {
        let mut candidates = Vec::new();
        for line in indexed_text.lines() {
            let Some((index, text)) = parse_indexed_line(line) else {
                continue;
            };
            let lower = text.to_lowercase();
            // claimed spans in the lowercased text, longest phrases first
            let mut claimed: Vec<(usize, usize)> = Vec::new();
            for entry in &self.entries {
                let needle = entry.phrase.to_lowercase();
                if let Some(at) = find_word_bounded(&lower, &needle)
                    && !claimed
                        .iter()
                        .any(|&(s, e)| at < e && at + needle.len() > s)
                {
                    claimed.push((at, at + needle.len()));
                    candidates.push(RawCandidate {
                        segment_index: index,
                        phrase: entry.phrase.clone(),
                        register: entry.register.clone(),
                        level: entry.level.clone(),
                        frequency: None,
                        translation: entry.translation.clone(),
                        alternative: entry.alternative.clone(),
                    });
                }
            }
        }
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

/// Splits an `[index] text` line into its parts.
fn parse_indexed_line(line: &str) -> Option<(i64, &str)> {
    let rest = line.trim_start().strip_prefix('[')?;
    let close = rest.find(']')?;
    let index: i64 = rest[..close].trim().parse().ok()?;
    Some((index, rest[close + 1..].trim_start()))
}

/// First occurrence of `needle` in `hay` with non-alphanumeric characters (or
/// the string edges) on both sides. Both inputs are already lowercased.
fn find_word_bounded(hay: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    for (at, _) in hay.match_indices(needle) {
        let before_ok = hay[..at]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        let after_ok = hay[at + needle.len()..]
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        if before_ok && after_ok {
            return Some(at);
        }
    }
    None
}
