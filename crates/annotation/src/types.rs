use serde::{Deserialize, Serialize};

/// A raw timed caption fragment as received from the upstream source.
///
/// Ordering is significant and fixed; fragments are consumed, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    /// Seconds from the start of the subject.
    pub start: f64,
    pub duration: f64,
}

/// A merged, readable paragraph derived from fragments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    /// Time of the paragraph's first original character.
    pub start: f64,
    /// Spans to the end time of the paragraph's last original character.
    pub duration: f64,
}

/// A chapter supplied by an external table-of-contents source.
///
/// `segment_range` is an inclusive index range into the paragraph list and is
/// treated as untrusted input; the planner normalizes ranges into a
/// contiguous partition before slicing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterSpec {
    pub title: String,
    pub start_time: f64,
    pub segment_range: (usize, usize),
}

/// A contiguous sub-range of the paragraph list submitted to the oracle as
/// one work unit.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Global index of the first paragraph in this chunk.
    pub start_index: usize,
    pub segments: Vec<Paragraph>,
    /// Chapter title, or `"<title> (part/total)"` for sub-split chapters.
    pub label: String,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns whether a global paragraph index falls inside this chunk.
    pub fn contains_index(&self, index: usize) -> bool {
        index >= self.start_index && index < self.start_index + self.segments.len()
    }

    /// Builds the oracle input: one `[global_index] text` line per paragraph.
    pub fn indexed_text(&self) -> String {
        let mut out = String::new();
        for (offset, segment) in self.segments.iter().enumerate() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{}] {}", self.start_index + offset, segment.text));
        }
        out
    }
}

/// Untrusted annotation candidate as returned by the oracle.
///
/// `segment_index` may be out of range and `phrase` may be truncated,
/// case-altered, or whitespace/quote-normalized relative to the source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    #[serde(default)]
    pub segment_index: i64,
    pub phrase: String,
    #[serde(default)]
    pub register: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub alternative: Option<String>,
}

/// Register tag assigned to an expression by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Register {
    GeneralSpoken,
    ProfessionalSpoken,
    RegionalCultural,
    FormalWritten,
}

impl Register {
    /// Parses an oracle-supplied register tag. Unrecognized tags fall back to
    /// the neutral `GeneralSpoken`.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("general_spoken") => Register::GeneralSpoken,
            Some("professional_spoken") => Register::ProfessionalSpoken,
            Some("regional_cultural") => Register::RegionalCultural,
            Some("formal_written") => Register::FormalWritten,
            _ => Register::GeneralSpoken,
        }
    }

    /// Fixed display color per register.
    pub fn color(self) -> &'static str {
        match self {
            Register::GeneralSpoken => "green",
            Register::ProfessionalSpoken => "blue",
            Register::RegionalCultural => "yellow",
            Register::FormalWritten => "gray",
        }
    }
}

/// An exact, offset-anchored annotation inside one paragraph.
///
/// `phrase` is a verbatim substring of the paragraph text; `start`/`end` are
/// byte offsets on char boundaries with `phrase == text[start..end]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub phrase: String,
    pub start: usize,
    pub end: usize,
    pub register: Register,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_from_tag() {
        assert_eq!(
            Register::from_tag(Some("professional_spoken")),
            Register::ProfessionalSpoken
        );
        assert_eq!(Register::from_tag(Some("no_such_tag")), Register::GeneralSpoken);
        assert_eq!(Register::from_tag(None), Register::GeneralSpoken);
    }

    #[test]
    fn test_indexed_text_uses_global_indices() {
        let chunk = Chunk {
            start_index: 7,
            segments: vec![
                Paragraph {
                    text: "First.".to_string(),
                    start: 0.0,
                    duration: 1.0,
                },
                Paragraph {
                    text: "Second.".to_string(),
                    start: 1.0,
                    duration: 1.0,
                },
            ],
            label: "Intro".to_string(),
        };
        assert_eq!(chunk.indexed_text(), "[7] First.\n[8] Second.");
        assert!(chunk.contains_index(7));
        assert!(chunk.contains_index(8));
        assert!(!chunk.contains_index(9));
    }
}
