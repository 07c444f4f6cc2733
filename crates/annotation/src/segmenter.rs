use std::cmp::Ordering;

use crate::types::{Fragment, Paragraph};

/// A trailing remainder shorter than this fraction of the soft threshold is
/// merged into the previous paragraph instead of being emitted alone.
const TAIL_MERGE_RATIO: f64 = 0.4;

/// Merges fragmented caption segments into readable paragraphs while keeping
/// each paragraph's timing anchored to its first and last original character.
///
/// Cuts land on sentence boundaries once the accumulated length crosses
/// `soft_max` characters; a stream with no sentence punctuation is cut every
/// `hard_max` characters at the nearest preceding space. Deterministic, no
/// I/O.
pub fn merge_fragments(fragments: &[Fragment], soft_max: usize, hard_max: usize) -> Vec<Paragraph> {
    let stream = TimedStream::build(fragments);
    if stream.text.is_empty() {
        return Vec::new();
    }

    let char_bytes: Vec<usize> = stream.text.char_indices().map(|(i, _)| i).collect();
    let char_count = char_bytes.len();
    let cuts = sentence_cut_points(&stream.text);

    let ranges = if cuts.is_empty() {
        hard_cut_ranges(&stream.text, &char_bytes, hard_max)
    } else {
        sentence_ranges(&stream.text, &char_bytes, &cuts, char_count, soft_max)
    };

    let mut paragraphs = Vec::with_capacity(ranges.len());
    for (range_start, range_end) in ranges {
        let Some((first, last)) = trim_range(&stream.text, &char_bytes, range_start, range_end)
        else {
            continue;
        };
        let byte_start = char_bytes[first];
        let byte_end = byte_end_of(&stream.text, &char_bytes, last);
        let (start, _) = stream.times_at(byte_start);
        let (_, end_time) = stream.times_at(char_bytes[last]);
        paragraphs.push(Paragraph {
            text: stream.text[byte_start..byte_end].to_string(),
            start,
            duration: (end_time - start).max(0.0),
        });
    }
    paragraphs
}

/// The concatenated fragment stream with a byte-span → timestamp map.
///
/// Fragments are joined with a single space; the joining space carries the
/// following fragment's times, so a paragraph starting on it inherits the
/// correct start time.
struct TimedStream {
    text: String,
    spans: Vec<TimeSpan>,
}

struct TimeSpan {
    byte_start: usize,
    byte_end: usize,
    start: f64,
    end: f64,
}

impl TimedStream {
    fn build(fragments: &[Fragment]) -> Self {
        let mut text = String::new();
        let mut spans: Vec<TimeSpan> = Vec::new();
        for fragment in fragments {
            let trimmed = fragment.text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let byte_start = text.len();
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(trimmed);
            spans.push(TimeSpan {
                byte_start,
                byte_end: text.len(),
                start: fragment.start,
                end: fragment.start + fragment.duration,
            });
        }
        Self { text, spans }
    }

    /// Timestamps of the fragment owning the character at byte position `pos`.
    fn times_at(&self, pos: usize) -> (f64, f64) {
        let found = self.spans.binary_search_by(|span| {
            if pos < span.byte_start {
                Ordering::Greater
            } else if pos >= span.byte_end {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        });
        match found {
            Ok(i) => (self.spans[i].start, self.spans[i].end),
            Err(_) => self
                .spans
                .last()
                .map(|span| (span.start, span.end))
                .unwrap_or((0.0, 0.0)),
        }
    }
}

/// Cut positions (char indices) immediately after a sentence terminator that
/// is followed by whitespace or end-of-stream. The cut lands after the
/// whitespace character itself.
fn sentence_cut_points(text: &str) -> Vec<usize> {
    let mut cuts = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if !matches!(c, '.' | '?' | '!') {
            continue;
        }
        match chars.get(i + 1) {
            Some(next) if next.is_whitespace() => cuts.push(i + 2),
            None => cuts.push(i + 1),
            _ => {}
        }
    }
    cuts
}

/// Greedy sentence accumulation: each paragraph extends to the first sentence
/// boundary at or past `soft_max` accumulated characters. The remainder past
/// the last boundary merges into the previous paragraph when it is too short
/// to stand alone.
fn sentence_ranges(
    text: &str,
    char_bytes: &[usize],
    cuts: &[usize],
    char_count: usize,
    soft_max: usize,
) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    let mut para_start = 0usize;
    let mut i = 0usize;

    while i < cuts.len() {
        let mut end = cuts[i];
        i += 1;
        while end.saturating_sub(para_start) < soft_max && i < cuts.len() {
            end = cuts[i];
            i += 1;
        }
        ranges.push((para_start, end));
        para_start = end;
    }

    if para_start < char_count {
        let tail_len = trimmed_len(text, char_bytes, para_start, char_count);
        let too_short = (tail_len as f64) < soft_max as f64 * TAIL_MERGE_RATIO;
        match ranges.last_mut() {
            Some(last) if too_short => last.1 = char_count,
            _ => ranges.push((para_start, char_count)),
        }
    }
    ranges
}

/// Forced cuts for a stream without sentence punctuation, preferring the
/// nearest preceding space over a mid-word cut.
fn hard_cut_ranges(text: &str, char_bytes: &[usize], hard_max: usize) -> Vec<(usize, usize)> {
    let char_count = char_bytes.len();
    let hard_max = hard_max.max(1);
    let mut ranges = Vec::new();
    let mut para_start = 0usize;

    while para_start < char_count {
        let mut end = (para_start + hard_max).min(char_count);
        if end < char_count {
            let window = &text[char_bytes[para_start]..char_bytes[end]];
            if let Some(rel) = window.rfind(' ') {
                let space_char = para_start + text[char_bytes[para_start]..][..rel].chars().count();
                if space_char > para_start {
                    end = space_char + 1;
                }
            }
        }
        ranges.push((para_start, end));
        para_start = end;
    }
    ranges
}

/// Shrinks a char range to exclude leading/trailing whitespace. Returns the
/// first and last char index of the trimmed content, or None when the range
/// holds only whitespace.
fn trim_range(
    text: &str,
    char_bytes: &[usize],
    start: usize,
    end: usize,
) -> Option<(usize, usize)> {
    let mut first = start;
    let mut last = end;
    while first < last && char_at(text, char_bytes, first).is_whitespace() {
        first += 1;
    }
    while last > first && char_at(text, char_bytes, last - 1).is_whitespace() {
        last -= 1;
    }
    if first >= last {
        None
    } else {
        Some((first, last - 1))
    }
}

fn trimmed_len(text: &str, char_bytes: &[usize], start: usize, end: usize) -> usize {
    match trim_range(text, char_bytes, start, end) {
        Some((first, last)) => last - first + 1,
        None => 0,
    }
}

fn char_at(text: &str, char_bytes: &[usize], index: usize) -> char {
    text[char_bytes[index]..].chars().next().unwrap_or(' ')
}

/// Byte offset one past the character at char index `last`.
fn byte_end_of(text: &str, char_bytes: &[usize], last: usize) -> usize {
    match char_bytes.get(last + 1) {
        Some(&b) => b,
        None => text.len(),
    }
}
