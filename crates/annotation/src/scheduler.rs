use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::{AnnotationCache, CacheKey};
use crate::config::AnnotationConfig;
use crate::oracle::AnnotationOracle;
use crate::planner::plan_chunks;
use crate::resolver;
use crate::types::{Annotation, ChapterSpec, Chunk, Paragraph, RawCandidate};

/// Resolved annotations for one completed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAnnotations {
    pub label: String,
    pub start_index: usize,
    pub len: usize,
    /// Paragraph index → ordered, non-overlapping annotations.
    pub annotations: BTreeMap<usize, Vec<Annotation>>,
    pub count: usize,
}

/// Whole-subject aggregate, cached only when every chunk succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectAnnotations {
    pub annotations: BTreeMap<usize, Vec<Annotation>>,
    pub total: usize,
    pub generated_at: DateTime<Utc>,
}

/// Events streamed to the caller while a subject is annotated.
///
/// Exactly one `Progress`, then zero or more `ChunkResult` in completion
/// order, then exactly one terminal `Done`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationEvent {
    Progress {
        total_chunks: usize,
        cached_chunks: usize,
        remaining_chunks: usize,
    },
    ChunkResult(ChunkAnnotations),
    Done {
        total: usize,
        failed_chunks: Vec<String>,
        from_cache: bool,
    },
}

/// Drives the oracle over all planned chunks under bounded concurrency,
/// retries transient failures, merges per-chunk caches, and streams results
/// as they complete.
///
/// Collaborators are injected at construction; the scheduler holds no global
/// state.
pub struct AnnotationScheduler {
    oracle: Arc<dyn AnnotationOracle>,
    cache: Arc<dyn AnnotationCache>,
    config: AnnotationConfig,
}

impl AnnotationScheduler {
    pub fn new(
        oracle: Arc<dyn AnnotationOracle>,
        cache: Arc<dyn AnnotationCache>,
        config: AnnotationConfig,
    ) -> Self {
        Self {
            oracle,
            cache,
            config,
        }
    }

    /// Starts annotating one subject and returns the event stream.
    ///
    /// Chunk results arrive in completion order, not index order; a consumer
    /// that needs index order re-sorts after collecting. Dropping the
    /// receiver stops emission but lets in-flight oracle calls run out.
    pub fn annotate_stream(
        &self,
        subject_id: impl Into<String>,
        paragraphs: Vec<Paragraph>,
        chapters: Option<Vec<ChapterSpec>>,
    ) -> mpsc::Receiver<AnnotationEvent> {
        let (tx, rx) = mpsc::channel(32);
        let run = AnnotationRun {
            oracle: Arc::clone(&self.oracle),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
            subject_id: subject_id.into(),
            paragraphs,
            chapters,
            tx,
        };
        tokio::spawn(run.run());
        rx
    }
}

/// One in-flight annotation request.
struct AnnotationRun {
    oracle: Arc<dyn AnnotationOracle>,
    cache: Arc<dyn AnnotationCache>,
    config: AnnotationConfig,
    subject_id: String,
    paragraphs: Vec<Paragraph>,
    chapters: Option<Vec<ChapterSpec>>,
    tx: mpsc::Sender<AnnotationEvent>,
}

enum ChunkOutcome {
    Completed(ChunkAnnotations),
    Failed { label: String },
}

impl AnnotationRun {
    async fn run(self) {
        let chunks = plan_chunks(&self.paragraphs, self.chapters.as_deref(), &self.config);
        let total_chunks = chunks.len();
        info!(
            subject = %self.subject_id,
            paragraphs = self.paragraphs.len(),
            chunks = total_chunks,
            backend = self.oracle.name(),
            "Annotation run started"
        );

        if let Some(aggregate) = self.cached_subject().await {
            self.emit(AnnotationEvent::Progress {
                total_chunks,
                cached_chunks: total_chunks,
                remaining_chunks: 0,
            })
            .await;
            let total = aggregate.total;
            self.emit(AnnotationEvent::ChunkResult(ChunkAnnotations {
                label: "cached".to_string(),
                start_index: 0,
                len: self.paragraphs.len(),
                annotations: aggregate.annotations,
                count: total,
            }))
            .await;
            self.emit(AnnotationEvent::Done {
                total,
                failed_chunks: Vec::new(),
                from_cache: true,
            })
            .await;
            return;
        }

        // Probe per-chunk cache entries; hits complete immediately.
        let mut cached_results = Vec::new();
        let mut pending = Vec::new();
        for chunk in chunks {
            match self.cached_chunk(&chunk).await {
                Some(result) => cached_results.push(result),
                None => pending.push(chunk),
            }
        }

        self.emit(AnnotationEvent::Progress {
            total_chunks,
            cached_chunks: cached_results.len(),
            remaining_chunks: pending.len(),
        })
        .await;

        let mut aggregate: BTreeMap<usize, Vec<Annotation>> = BTreeMap::new();
        let mut total = 0usize;
        let mut failed: Vec<String> = Vec::new();

        for result in cached_results {
            self.absorb(&mut aggregate, &mut total, &result);
            self.emit(AnnotationEvent::ChunkResult(result)).await;
        }

        // Fan pending chunks out over the bounded worker pool and forward
        // results in completion order.
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut workers = JoinSet::new();
        let mut labels: HashMap<tokio::task::Id, String> = HashMap::new();
        for chunk in pending {
            let oracle = Arc::clone(&self.oracle);
            let config = self.config.clone();
            let semaphore = Arc::clone(&semaphore);
            let label = chunk.label.clone();
            let worker_label = chunk.label.clone();
            let handle = workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return ChunkOutcome::Failed { label: worker_label },
                };
                annotate_chunk(oracle, &config, chunk).await
            });
            labels.insert(handle.id(), label);
        }

        while let Some(joined) = workers.join_next_with_id().await {
            match joined {
                Ok((_, ChunkOutcome::Completed(result))) => {
                    self.store_chunk(&result).await;
                    self.absorb(&mut aggregate, &mut total, &result);
                    self.emit(AnnotationEvent::ChunkResult(result)).await;
                }
                Ok((_, ChunkOutcome::Failed { label })) => failed.push(label),
                Err(e) => {
                    warn!(%e, "Chunk worker task failed");
                    failed.push(labels.get(&e.id()).cloned().unwrap_or_default());
                }
            }
        }

        // Only a complete run is worth caching; a run with failed chunks
        // would permanently serve incomplete data.
        if failed.is_empty() {
            let record = SubjectAnnotations {
                annotations: aggregate,
                total,
                generated_at: Utc::now(),
            };
            self.store_subject(&record).await;
        } else {
            warn!(
                subject = %self.subject_id,
                failed = failed.len(),
                "Annotation run finished with failed chunks, skipping aggregate cache"
            );
        }

        info!(subject = %self.subject_id, total, failed = failed.len(), "Annotation run finished");
        self.emit(AnnotationEvent::Done {
            total,
            failed_chunks: failed,
            from_cache: false,
        })
        .await;
    }

    async fn cached_subject(&self) -> Option<SubjectAnnotations> {
        let key = CacheKey::subject(&self.subject_id);
        match self.cache.get(&key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(aggregate) => {
                    info!(subject = %self.subject_id, "Serving whole-subject annotations from cache");
                    Some(aggregate)
                }
                Err(e) => {
                    warn!(%key, %e, "Undecodable cache entry, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(%key, %e, "Cache probe failed, treating as miss");
                None
            }
        }
    }

    async fn cached_chunk(&self, chunk: &Chunk) -> Option<ChunkAnnotations> {
        let key = CacheKey::chunk(&self.subject_id, chunk.start_index, chunk.len());
        match self.cache.get(&key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!(%key, %e, "Undecodable cache entry, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(%key, %e, "Cache probe failed, treating as miss");
                None
            }
        }
    }

    async fn store_chunk(&self, result: &ChunkAnnotations) {
        let key = CacheKey::chunk(&self.subject_id, result.start_index, result.len);
        match serde_json::to_value(result) {
            Ok(value) => {
                if let Err(e) = self.cache.set(&key, value).await {
                    warn!(%key, %e, "Failed to cache chunk result");
                }
            }
            Err(e) => warn!(%key, %e, "Failed to encode chunk result"),
        }
    }

    async fn store_subject(&self, record: &SubjectAnnotations) {
        let key = CacheKey::subject(&self.subject_id);
        match serde_json::to_value(record) {
            Ok(value) => {
                if let Err(e) = self.cache.set(&key, value).await {
                    warn!(%key, %e, "Failed to cache subject aggregate");
                }
            }
            Err(e) => warn!(%key, %e, "Failed to encode subject aggregate"),
        }
    }

    /// Merges one chunk's annotations into the subject aggregate, validating
    /// paragraph indices against the known paragraph count.
    fn absorb(
        &self,
        aggregate: &mut BTreeMap<usize, Vec<Annotation>>,
        total: &mut usize,
        result: &ChunkAnnotations,
    ) {
        for (&index, annotations) in &result.annotations {
            if index >= self.paragraphs.len() {
                warn!(
                    index,
                    paragraphs = self.paragraphs.len(),
                    "Dropping annotations for unknown paragraph index"
                );
                continue;
            }
            aggregate
                .entry(index)
                .or_default()
                .extend(annotations.iter().cloned());
        }
        *total += result.count;
    }

    async fn emit(&self, event: AnnotationEvent) {
        if self.tx.send(event).await.is_err() {
            debug!(subject = %self.subject_id, "Event receiver dropped, continuing without emission");
        }
    }
}

/// Runs one chunk through the oracle with retries, then resolves candidates
/// into exact annotations. Attempts share no state; each retry starts from
/// the chunk's indexed text.
async fn annotate_chunk(
    oracle: Arc<dyn AnnotationOracle>,
    config: &AnnotationConfig,
    chunk: Chunk,
) -> ChunkOutcome {
    let indexed = chunk.indexed_text();
    let max_attempts = config.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match oracle.classify(&indexed).await {
            Ok(candidates) => {
                debug!(
                    chunk = %chunk.label,
                    attempt,
                    candidates = candidates.len(),
                    "Oracle call succeeded"
                );
                return ChunkOutcome::Completed(resolve_chunk(&chunk, candidates));
            }
            Err(e) => {
                warn!(
                    chunk = %chunk.label,
                    attempt,
                    max_attempts,
                    %e,
                    "Oracle call failed"
                );
                if attempt < max_attempts {
                    tokio::time::sleep(backoff(config.retry_backoff_ms, attempt)).await;
                }
            }
        }
    }

    ChunkOutcome::Failed { label: chunk.label }
}

/// Resolves raw candidates against their chunk: out-of-range indices are
/// dropped before resolution, unresolvable phrases are dropped with a
/// diagnostic, and per-paragraph overlaps are pruned first-position-wins.
fn resolve_chunk(chunk: &Chunk, candidates: Vec<RawCandidate>) -> ChunkAnnotations {
    let mut grouped: BTreeMap<usize, Vec<Annotation>> = BTreeMap::new();
    for candidate in candidates {
        let Ok(index) = usize::try_from(candidate.segment_index) else {
            continue;
        };
        if !chunk.contains_index(index) {
            continue;
        }
        let text = &chunk.segments[index - chunk.start_index].text;
        if let Some(annotation) = resolver::resolve_candidate(&candidate, index, text) {
            grouped.entry(index).or_default().push(annotation);
        }
    }

    let mut count = 0usize;
    let mut annotations = BTreeMap::new();
    for (index, spans) in grouped {
        let kept = resolver::prune_overlaps(spans);
        if !kept.is_empty() {
            count += kept.len();
            annotations.insert(index, kept);
        }
    }

    ChunkAnnotations {
        label: chunk.label.clone(),
        start_index: chunk.start_index,
        len: chunk.len(),
        annotations,
        count,
    }
}

/// Linear backoff with jitter so retries from parallel workers spread out.
fn backoff(base_ms: u64, attempt: u32) -> Duration {
    let jitter = if base_ms > 1 {
        rand::rng().random_range(0..base_ms / 2)
    } else {
        0
    };
    Duration::from_millis(base_ms * u64::from(attempt) + jitter)
}
