use tracing::debug;

use crate::types::{Annotation, RawCandidate, Register};

/// How much paragraph text to include in a dropped-candidate diagnostic.
const DIAGNOSTIC_PREVIEW_CHARS: usize = 80;

/// Resolves an oracle candidate to an exact annotation inside its paragraph,
/// or drops it with a diagnostic when the phrase cannot be located.
pub fn resolve_candidate(
    candidate: &RawCandidate,
    paragraph_index: usize,
    paragraph_text: &str,
) -> Option<Annotation> {
    let Some((start, end)) = resolve_span(paragraph_text, &candidate.phrase) else {
        debug!(
            phrase = %candidate.phrase,
            paragraph = paragraph_index,
            text = %preview(paragraph_text),
            "Dropping unresolvable candidate"
        );
        return None;
    };
    let register = Register::from_tag(candidate.register.as_deref());
    Some(Annotation {
        phrase: paragraph_text[start..end].to_string(),
        start,
        end,
        register,
        color: register.color().to_string(),
        level: candidate.level.clone(),
        frequency: candidate.frequency.clone(),
        translation: candidate.translation.clone(),
        alternative: candidate.alternative.clone(),
    })
}

/// Locates an approximate phrase inside the paragraph, returning exact byte
/// offsets into the original text. Tiers are tried in order, first hit wins:
///
/// 1. case-insensitive exact search
/// 2. whitespace/quote-normalized search, re-anchored to original offsets
/// 3. for phrases of 3+ words: drop the last word, then the first word
/// 4. for phrases of 4+ words: drop both boundary words
///
/// Deterministic: the same inputs always produce the same span or none.
pub fn resolve_span(paragraph: &str, phrase: &str) -> Option<(usize, usize)> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return None;
    }

    if let Some(span) = search(paragraph, phrase) {
        return Some(span);
    }

    // The oracle sometimes over-captures one word at either boundary.
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.len() >= 3 {
        for variant in [
            words[..words.len() - 1].join(" "),
            words[1..].join(" "),
        ] {
            if let Some(span) = search(paragraph, &variant) {
                return Some(span);
            }
        }
    }
    if words.len() >= 4 {
        let variant = words[1..words.len() - 1].join(" ");
        if let Some(span) = search(paragraph, &variant) {
            return Some(span);
        }
    }
    None
}

/// Sorts spans by start offset and keeps each span only when it does not
/// overlap an already-kept span. First-by-position wins; losers are dropped
/// without a diagnostic.
pub fn prune_overlaps(mut annotations: Vec<Annotation>) -> Vec<Annotation> {
    annotations.sort_by_key(|a| (a.start, a.end));
    let mut kept: Vec<Annotation> = Vec::new();
    for annotation in annotations {
        let clear = kept
            .last()
            .map(|prev| annotation.start >= prev.end)
            .unwrap_or(true);
        if clear {
            kept.push(annotation);
        }
    }
    kept
}

/// Exact tier then normalized tier.
fn search(paragraph: &str, phrase: &str) -> Option<(usize, usize)> {
    let exact_hay = map_chars(paragraph, false);
    let exact_needle: Vec<char> = phrase.chars().collect();
    if let Some(at) = find_ci(&exact_hay.chars, &exact_needle) {
        return Some(exact_hay.span(at, exact_needle.len()));
    }

    let norm_hay = map_chars(paragraph, true);
    let norm_needle = map_chars(phrase, true);
    if let Some(at) = find_ci(&norm_hay.chars, &norm_needle.chars) {
        return Some(norm_hay.span(at, norm_needle.chars.len()));
    }
    None
}

/// A character view of a string that remembers each character's byte span in
/// the original text, so normalized matches recover exact original offsets.
struct MappedChars {
    chars: Vec<char>,
    byte_start: Vec<usize>,
    byte_end: Vec<usize>,
}

impl MappedChars {
    fn span(&self, at: usize, len: usize) -> (usize, usize) {
        (self.byte_start[at], self.byte_end[at + len - 1])
    }
}

/// Builds the character view. With `normalize`, whitespace runs collapse to a
/// single space and curly quotes map to their straight equivalents.
fn map_chars(text: &str, normalize: bool) -> MappedChars {
    let mut mapped = MappedChars {
        chars: Vec::new(),
        byte_start: Vec::new(),
        byte_end: Vec::new(),
    };
    let mut in_space_run = false;
    for (i, c) in text.char_indices() {
        let c_out = if normalize {
            match c {
                '\u{2018}' | '\u{2019}' => '\'',
                '\u{201C}' | '\u{201D}' => '"',
                c if c.is_whitespace() => ' ',
                c => c,
            }
        } else {
            c
        };
        if normalize && c_out == ' ' {
            if in_space_run {
                continue;
            }
            in_space_run = true;
        } else {
            in_space_run = false;
        }
        mapped.chars.push(c_out);
        mapped.byte_start.push(i);
        mapped.byte_end.push(i + c.len_utf8());
    }
    mapped
}

/// First case-insensitive occurrence of `needle` in `hay`.
fn find_ci(hay: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&at| {
        hay[at..at + needle.len()]
            .iter()
            .zip(needle)
            .all(|(&h, &n)| chars_eq_ci(h, n))
    })
}

fn chars_eq_ci(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn preview(text: &str) -> String {
    if text.chars().count() <= DIAGNOSTIC_PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(DIAGNOSTIC_PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}
