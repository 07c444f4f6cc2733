use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::types::RawCandidate;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("oracle returned empty output")]
    Empty,
    #[error("unparseable oracle output: {preview}")]
    Unparseable { preview: String },
}

/// Parses an oracle's raw text output into candidates.
///
/// Model output is frequently imperfect JSON: fenced in markdown, cut off
/// mid-object by an output-token limit, or left with a dangling comma. Repair
/// tiers are tried in order, each a pure function over the raw text; when all
/// fail the error is explicit, never a fallthrough.
pub fn parse_candidates(raw: &str) -> Result<Vec<RawCandidate>, ParseError> {
    let text = strip_fence(raw.trim());
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let values = parse_direct(text)
        .or_else(|| parse_truncated(text))
        .or_else(|| parse_reclosed(text))
        .ok_or_else(|| ParseError::Unparseable {
            preview: preview(text),
        })?;

    Ok(to_candidates(values))
}

/// Strips a surrounding markdown code fence, if present.
fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // skip the language tag on the opening fence line
    let rest = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

/// Tier 1: the output is already a valid JSON array.
fn parse_direct(text: &str) -> Option<Vec<Value>> {
    serde_json::from_str(text).ok()
}

/// Tier 2: truncate to the last complete object and close the array.
/// Recovers arrays cut off mid-object.
fn parse_truncated(text: &str) -> Option<Vec<Value>> {
    let last_brace = text.rfind('}')?;
    let body = text[..=last_brace].trim_end().trim_end_matches(',');
    let array_start = body.find('[')?;
    let candidate = format!("{}]", &body[array_start..]);
    serde_json::from_str(&candidate).ok()
}

/// Tier 3: strip a dangling comma and re-close the array.
fn parse_reclosed(text: &str) -> Option<Vec<Value>> {
    let trimmed = text.trim_end().trim_end_matches(',');
    let fixed = match trimmed.rfind(']') {
        Some(at) => trimmed[..=at].to_string(),
        None => format!("{trimmed}]"),
    };
    serde_json::from_str(&fixed).ok()
}

/// Converts parsed elements, skipping ones that do not fit the candidate
/// shape instead of failing the whole batch.
fn to_candidates(values: Vec<Value>) -> Vec<RawCandidate> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawCandidate>(value) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                debug!(%e, "Skipping malformed candidate element");
                None
            }
        })
        .collect()
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}...")
    }
}
