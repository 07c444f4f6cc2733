pub mod cache;
pub mod chapters;
pub mod config;
pub mod oracle;
pub mod planner;
pub mod resolver;
pub mod scheduler;
pub mod segmenter;
pub mod types;

pub use cache::{AnnotationCache, CacheKey, CacheScope, MemoryCache};
pub use chapters::{ChapterOutline, assign_segment_ranges};
pub use config::AnnotationConfig;
pub use oracle::AnnotationOracle;
pub use planner::plan_chunks;
pub use scheduler::{AnnotationEvent, AnnotationScheduler, ChunkAnnotations, SubjectAnnotations};
pub use segmenter::merge_fragments;
pub use types::{Annotation, ChapterSpec, Chunk, Fragment, Paragraph, RawCandidate, Register};
