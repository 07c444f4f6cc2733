use crate::config::AnnotationConfig;
use crate::types::{ChapterSpec, Chunk, Paragraph};

/// Partitions the paragraph list into bounded work units.
///
/// With chapters, chunks follow chapter boundaries and oversized chapters are
/// sub-split; without them, the list is cut into consecutive fixed-size
/// chunks. The returned chunks cover every paragraph exactly once, in order.
pub fn plan_chunks(
    paragraphs: &[Paragraph],
    chapters: Option<&[ChapterSpec]>,
    config: &AnnotationConfig,
) -> Vec<Chunk> {
    if paragraphs.is_empty() {
        return Vec::new();
    }
    match chapters {
        Some(chapters) if !chapters.is_empty() => {
            chapter_chunks(paragraphs, chapters, config.chapter_chunk_size.max(1))
        }
        _ => flat_chunks(paragraphs, config.flat_chunk_size.max(1)),
    }
}

/// Chapter-aligned chunking. Supplied ranges are external input, so they are
/// first normalized into a contiguous partition: the first chapter is pulled
/// back to index 0, each chapter ends where the next begins, and the last
/// chapter extends to the end of the list.
fn chapter_chunks(paragraphs: &[Paragraph], chapters: &[ChapterSpec], max_size: usize) -> Vec<Chunk> {
    let count = paragraphs.len();
    let mut starts = Vec::with_capacity(chapters.len());
    let mut prev = 0usize;
    for (i, chapter) in chapters.iter().enumerate() {
        let start = if i == 0 {
            0
        } else {
            chapter.segment_range.0.min(count - 1).max(prev)
        };
        starts.push(start);
        prev = start;
    }

    let mut chunks = Vec::new();
    for (i, chapter) in chapters.iter().enumerate() {
        let start = starts[i];
        let end = starts.get(i + 1).copied().unwrap_or(count);
        if end <= start {
            continue;
        }
        let slice = &paragraphs[start..end];
        if slice.len() <= max_size {
            chunks.push(Chunk {
                start_index: start,
                segments: slice.to_vec(),
                label: chapter.title.clone(),
            });
        } else {
            let total = slice.len().div_ceil(max_size);
            for (part, sub) in slice.chunks(max_size).enumerate() {
                chunks.push(Chunk {
                    start_index: start + part * max_size,
                    segments: sub.to_vec(),
                    label: format!("{} ({}/{})", chapter.title, part + 1, total),
                });
            }
        }
    }
    chunks
}

fn flat_chunks(paragraphs: &[Paragraph], size: usize) -> Vec<Chunk> {
    paragraphs
        .chunks(size)
        .enumerate()
        .map(|(i, slice)| {
            let start_index = i * size;
            Chunk {
                start_index,
                segments: slice.to_vec(),
                label: format!("segments {}-{}", start_index, start_index + slice.len() - 1),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(count: usize) -> Vec<Paragraph> {
        (0..count)
            .map(|i| Paragraph {
                text: format!("paragraph {i}"),
                start: i as f64,
                duration: 1.0,
            })
            .collect()
    }

    fn chapter(title: &str, range: (usize, usize)) -> ChapterSpec {
        ChapterSpec {
            title: title.to_string(),
            start_time: range.0 as f64,
            segment_range: range,
        }
    }

    fn assert_partition(chunks: &[Chunk], count: usize) {
        let mut next = 0usize;
        for chunk in chunks {
            assert_eq!(chunk.start_index, next);
            next += chunk.segments.len();
        }
        assert_eq!(next, count);
    }

    #[test]
    fn test_flat_chunks_partition() {
        let paras = paragraphs(23);
        let config = AnnotationConfig {
            flat_chunk_size: 10,
            ..Default::default()
        };
        let chunks = plan_chunks(&paras, None, &config);
        assert_eq!(chunks.len(), 3);
        assert_partition(&chunks, 23);
        assert_eq!(chunks[2].segments.len(), 3);
        assert_eq!(chunks[0].label, "segments 0-9");
        assert_eq!(chunks[2].label, "segments 20-22");
    }

    #[test]
    fn test_chapter_chunks_respect_boundaries() {
        let paras = paragraphs(10);
        let chapters = vec![chapter("Intro", (0, 3)), chapter("Main", (4, 9))];
        let config = AnnotationConfig {
            chapter_chunk_size: 20,
            ..Default::default()
        };
        let chunks = plan_chunks(&paras, Some(&chapters), &config);
        assert_eq!(chunks.len(), 2);
        assert_partition(&chunks, 10);
        assert_eq!(chunks[0].label, "Intro");
        assert_eq!(chunks[0].segments.len(), 4);
        assert_eq!(chunks[1].start_index, 4);
        assert_eq!(chunks[1].segments.len(), 6);
    }

    #[test]
    fn test_oversized_chapter_is_sub_split_with_part_labels() {
        let paras = paragraphs(12);
        let chapters = vec![chapter("Deep Dive", (0, 11))];
        let config = AnnotationConfig {
            chapter_chunk_size: 5,
            ..Default::default()
        };
        let chunks = plan_chunks(&paras, Some(&chapters), &config);
        assert_eq!(chunks.len(), 3);
        assert_partition(&chunks, 12);
        assert_eq!(chunks[0].label, "Deep Dive (1/3)");
        assert_eq!(chunks[1].label, "Deep Dive (2/3)");
        assert_eq!(chunks[1].start_index, 5);
        assert_eq!(chunks[2].label, "Deep Dive (3/3)");
        assert_eq!(chunks[2].segments.len(), 2);
    }

    #[test]
    fn test_malformed_ranges_normalize_to_partition() {
        let paras = paragraphs(8);
        // overlapping, gapped, and out-of-range chapter input
        let chapters = vec![
            chapter("A", (2, 5)),
            chapter("B", (4, 4)),
            chapter("C", (7, 99)),
        ];
        let config = AnnotationConfig {
            chapter_chunk_size: 20,
            ..Default::default()
        };
        let chunks = plan_chunks(&paras, Some(&chapters), &config);
        assert_partition(&chunks, 8);
    }

    #[test]
    fn test_empty_inputs() {
        let config = AnnotationConfig::default();
        assert!(plan_chunks(&[], None, &config).is_empty());
        let paras = paragraphs(3);
        let chunks = plan_chunks(&paras, Some(&[]), &config);
        assert_partition(&chunks, 3);
    }
}
