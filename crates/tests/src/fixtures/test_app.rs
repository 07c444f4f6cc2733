use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use subtext_annotation::cache::{AnnotationCache, MemoryCache};
use subtext_annotation::oracle::AnnotationOracle;
use subtext_annotation::types::RawCandidate;
use subtext_api::{build_router, state::AppState};
use subtext_config::AppConfig;

/// Oracle double for end-to-end tests: emits one "circle back" candidate per
/// indexed segment, with scripted failures per chunk (keyed by the chunk's
/// first paragraph index).
#[derive(Default)]
pub struct MockOracle {
    pub fail_first: HashMap<usize, u32>,
    calls: Mutex<HashMap<usize, u32>>,
}

impl MockOracle {
    pub fn failing(chunk_start: usize, failures: u32) -> Self {
        Self {
            fail_first: HashMap::from([(chunk_start, failures)]),
            calls: Mutex::default(),
        }
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl AnnotationOracle for MockOracle {
    async fn classify(&self, indexed_text: &str) -> anyhow::Result<Vec<RawCandidate>> {
        let chunk_start = first_index(indexed_text);
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(chunk_start).or_insert(0);
            *count += 1;
            *count
        };
        if attempt <= self.fail_first.get(&chunk_start).copied().unwrap_or(0) {
            anyhow::bail!("scripted failure on attempt {attempt}");
        }

        Ok(indexed_text
            .lines()
            .map(|line| RawCandidate {
                segment_index: first_index(line) as i64,
                phrase: "circle back".to_string(),
                register: Some("professional_spoken".to_string()),
                level: Some("B2".to_string()),
                frequency: Some("high".to_string()),
                translation: None,
                alternative: None,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn first_index(indexed_text: &str) -> usize {
    let line = indexed_text.lines().next().unwrap_or("");
    let open = line.find('[').unwrap_or(0);
    let close = line.find(']').unwrap_or(0);
    line[open + 1..close].parse().unwrap_or(0)
}

/// A server spawned on an ephemeral port with the mock oracle and an
/// in-process cache wired in.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub oracle: Arc<MockOracle>,
    pub cache: Arc<MemoryCache>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockOracle::default()).await
    }

    pub async fn spawn_with(oracle: MockOracle) -> Self {
        let oracle = Arc::new(oracle);
        let cache = Arc::new(MemoryCache::new());

        let mut config = AppConfig::default();
        config.pipeline.flat_chunk_size = 2;
        config.pipeline.retry_backoff_ms = 1;

        let state = AppState::new(
            config,
            oracle.clone() as Arc<dyn AnnotationOracle>,
            cache.clone() as Arc<dyn AnnotationCache>,
        );
        let router = build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            oracle,
            cache,
        }
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    /// Posts to an SSE endpoint and parses the full event stream into
    /// `(event_name, data)` pairs, the way a web client would.
    pub async fn collect_sse(&self, path: &str, body: &Value) -> Vec<(String, Value)> {
        let response = self.post_json(path, body).await;
        assert_eq!(response.status().as_u16(), 200);
        let text = response.text().await.unwrap();

        let mut events = Vec::new();
        let mut event_name = String::new();
        for line in text.lines() {
            if let Some(name) = line.strip_prefix("event:") {
                event_name = name.trim().to_string();
            } else if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !event_name.is_empty() && !data.is_empty() {
                    events.push((
                        event_name.clone(),
                        serde_json::from_str(data).unwrap_or(Value::Null),
                    ));
                }
            }
        }
        events
    }
}
