use crate::fixtures::test_app::{MockOracle, TestApp};
use serde_json::{Value, json};

fn annotate_body(subject_id: &str, paragraph_count: usize) -> Value {
    let paragraphs: Vec<Value> = (0..paragraph_count)
        .map(|i| {
            json!({
                "text": format!("segment {i} says we should circle back on this soon"),
                "start": i as f64,
                "duration": 1.0
            })
        })
        .collect();
    json!({"subject_id": subject_id, "paragraphs": paragraphs})
}

#[tokio::test]
async fn annotate_streams_progress_chunks_and_done() {
    let app = TestApp::spawn().await;
    let events = app
        .collect_sse("/api/annotate", &annotate_body("vid1", 4))
        .await;

    // 4 paragraphs at chunk size 2 → progress + 2 chunk results + done
    assert_eq!(events[0].0, "progress");
    assert_eq!(events[0].1["total_chunks"], 2);
    assert_eq!(events[0].1["remaining_chunks"], 2);

    let chunk_events: Vec<&Value> = events
        .iter()
        .filter(|(name, _)| name == "chunk_result")
        .map(|(_, data)| data)
        .collect();
    assert_eq!(chunk_events.len(), 2);
    for chunk in &chunk_events {
        assert!(chunk["count"].as_u64().unwrap() > 0);
        assert!(chunk["label"].as_str().unwrap().starts_with("segments"));
    }

    let (name, done) = events.last().unwrap();
    assert_eq!(name, "done");
    assert_eq!(done["total"], 4);
    assert_eq!(done["failed_chunks"], json!([]));
    assert_eq!(done["from_cache"], false);
}

#[tokio::test]
async fn annotations_carry_exact_offsets() {
    let app = TestApp::spawn().await;
    let body = annotate_body("vid2", 2);
    let events = app.collect_sse("/api/annotate", &body).await;

    let paragraphs = body["paragraphs"].as_array().unwrap();
    for (name, data) in &events {
        if name != "chunk_result" {
            continue;
        }
        for (index, annotations) in data["annotations"].as_object().unwrap() {
            let text = paragraphs[index.parse::<usize>().unwrap()]["text"]
                .as_str()
                .unwrap();
            for annotation in annotations.as_array().unwrap() {
                let start = annotation["start"].as_u64().unwrap() as usize;
                let end = annotation["end"].as_u64().unwrap() as usize;
                assert_eq!(&text[start..end], annotation["phrase"].as_str().unwrap());
                assert_eq!(annotation["register"], "professional_spoken");
                assert_eq!(annotation["color"], "blue");
            }
        }
    }
}

#[tokio::test]
async fn failed_chunk_is_reported_not_fatal() {
    let app = TestApp::spawn_with(MockOracle::failing(2, 99)).await;
    let events = app
        .collect_sse("/api/annotate", &annotate_body("vid3", 4))
        .await;

    let (name, done) = events.last().unwrap();
    assert_eq!(name, "done");
    // the healthy chunk still contributed
    assert_eq!(done["total"], 2);
    assert_eq!(done["failed_chunks"], json!(["segments 2-3"]));
}

#[tokio::test]
async fn second_request_is_served_from_cache() {
    let app = TestApp::spawn().await;
    app.collect_sse("/api/annotate", &annotate_body("vid4", 4))
        .await;
    let calls_after_first = app.oracle.total_calls();

    let events = app
        .collect_sse("/api/annotate", &annotate_body("vid4", 4))
        .await;
    assert_eq!(app.oracle.total_calls(), calls_after_first);

    let (name, done) = events.last().unwrap();
    assert_eq!(name, "done");
    assert_eq!(done["from_cache"], true);
    assert_eq!(done["total"], 4);
}

#[tokio::test]
async fn invalid_request_is_rejected() {
    let app = TestApp::spawn().await;
    let resp = app
        .post_json("/api/annotate", &annotate_body("", 2))
        .await;
    assert_eq!(resp.status().as_u16(), 422);

    let resp = app
        .post_json(
            "/api/annotate",
            &json!({"subject_id": "vid5", "paragraphs": []}),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn chapter_labels_flow_through_chunk_results() {
    let app = TestApp::spawn().await;
    let mut body = annotate_body("vid6", 4);
    body["chapters"] = json!([
        {"title": "Intro", "start_time": 0.0, "segment_range": [0, 1]},
        {"title": "Wrap-up", "start_time": 2.0, "segment_range": [2, 3]}
    ]);
    let events = app.collect_sse("/api/annotate", &body).await;

    let mut labels: Vec<String> = events
        .iter()
        .filter(|(name, _)| name == "chunk_result")
        .map(|(_, data)| data["label"].as_str().unwrap().to_string())
        .collect();
    labels.sort();
    assert_eq!(labels, vec!["Intro".to_string(), "Wrap-up".to_string()]);
}
