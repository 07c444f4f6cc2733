use crate::fixtures::test_app::TestApp;
use serde_json::{Value, json};

#[tokio::test]
async fn health_check_reports_ok() {
    let app = TestApp::spawn().await;
    let resp = app.get("/health").await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn merge_fragments_into_paragraphs() {
    let app = TestApp::spawn().await;
    let resp = app
        .post_json(
            "/api/paragraphs",
            &json!({
                "fragments": [
                    {"text": "Hello", "start": 0.0, "duration": 0.5},
                    {"text": "world.", "start": 0.5, "duration": 0.5},
                    {"text": "Another sentence lands here.", "start": 1.0, "duration": 2.0}
                ]
            }),
        )
        .await;

    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    let paragraphs = json["paragraphs"].as_array().unwrap();
    assert_eq!(json["total"], paragraphs.len() as i64);
    assert!(!paragraphs.is_empty());
    assert!(
        paragraphs[0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Hello world.")
    );
    assert_eq!(paragraphs[0]["start"], 0.0);
}

#[tokio::test]
async fn empty_fragments_are_rejected() {
    let app = TestApp::spawn().await;
    let resp = app.post_json("/api/paragraphs", &json!({"fragments": []})).await;
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn align_chapters_to_paragraphs() {
    let app = TestApp::spawn().await;
    let resp = app
        .post_json(
            "/api/chapters/align",
            &json!({
                "chapters": [
                    {"title": "Intro", "start_time": 0.0},
                    {"title": "Main", "start_time": 20.0}
                ],
                "paragraphs": [
                    {"text": "a", "start": 0.0, "duration": 10.0},
                    {"text": "b", "start": 10.0, "duration": 10.0},
                    {"text": "c", "start": 20.0, "duration": 10.0}
                ]
            }),
        )
        .await;

    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    let chapters = json["chapters"].as_array().unwrap();
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0]["segment_range"], json!([0, 1]));
    assert_eq!(chapters[1]["segment_range"], json!([2, 2]));
}
