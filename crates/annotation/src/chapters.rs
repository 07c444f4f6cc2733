use serde::{Deserialize, Serialize};

use crate::types::{ChapterSpec, Paragraph};

/// A chapter as produced by an external table-of-contents source: a title and
/// a start time, before any paragraph range is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterOutline {
    pub title: String,
    pub start_time: f64,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Derives each chapter's inclusive paragraph range from chapter start times:
/// a chapter covers the paragraphs starting at or after its start time and
/// before the next chapter's.
pub fn assign_segment_ranges(
    outlines: &[ChapterOutline],
    paragraphs: &[Paragraph],
) -> Vec<ChapterSpec> {
    let fallback_last = paragraphs.len().saturating_sub(1);
    outlines
        .iter()
        .enumerate()
        .map(|(i, outline)| {
            let window_end = outlines
                .get(i + 1)
                .map(|next| next.start_time)
                .unwrap_or(f64::INFINITY);

            let mut first = None;
            let mut last = None;
            for (index, paragraph) in paragraphs.iter().enumerate() {
                if paragraph.start >= outline.start_time && first.is_none() {
                    first = Some(index);
                }
                if paragraph.start < window_end {
                    last = Some(index);
                }
            }

            ChapterSpec {
                title: outline.title.clone(),
                start_time: outline.start_time,
                segment_range: (first.unwrap_or(0), last.unwrap_or(fallback_last)),
            }
        })
        .collect()
}
