use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use crate::helpers::{file_changed_event, spawn_app, EMBEDDING_DIMENSION};

const FILE_ID: &str = "2aefec79-7f0b-4486-a192-19e19b14483f";

#[tokio::test]
async fn a_changed_file_is_stored_with_its_content_embedding() {
    let app = spawn_app().await;
    app.mount_file_content(FILE_ID, "Quarterly report draft.").await;
    app.mount_embedding(vec![0.5; EMBEDDING_DIMENSION]).await;

    let response = app
        .post_file_changed(file_changed_event(FILE_ID, "report.txt", 23))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("Failed to parse the body");
    assert_eq!(
        body["message"],
        "File data and embedding successfully upserted into the database."
    );

    let files = app.merge_files().await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, FILE_ID);
    assert_eq!(files[0].name.as_deref(), Some("report.txt"));
    assert_eq!(files[0].size, Some(23));
    assert_eq!(files[0].mime_type.as_deref(), Some("text/plain"));
    assert_eq!(files[0].remote_id.as_deref(), Some("19a3Nf2RZcbkhf6Lq6xW4t"));
    assert_eq!(
        files[0].file_thumbnail_url.as_deref(),
        Some("https://drive.example.com/thumbnails/report.png")
    );
    assert_eq!(
        files[0].remote_updated_at,
        Some(Utc.with_ymd_and_hms(2021, 11, 20, 0, 0, 0).unwrap())
    );

    let embeddings = app.file_embeddings().await;
    assert_eq!(embeddings.len(), 1);
    assert_eq!(embeddings[0].file_id, FILE_ID);
    assert_eq!(embeddings[0].section, "content");
    assert_eq!(embeddings[0].text_content, "Quarterly report draft.");
    assert_eq!(embeddings[0].embedding.to_vec(), vec![0.5; EMBEDDING_DIMENSION]);
}

#[tokio::test]
async fn a_redelivered_event_replaces_the_stored_rows() {
    let app = spawn_app().await;
    app.mount_file_content(FILE_ID, "Quarterly report draft.").await;
    app.mount_embedding(vec![0.5; EMBEDDING_DIMENSION]).await;

    for _ in 0..2 {
        let response = app
            .post_file_changed(file_changed_event(FILE_ID, "report.txt", 23))
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    assert_eq!(app.merge_files().await.len(), 1);
    assert_eq!(app.file_embeddings().await.len(), 1);
}

#[tokio::test]
async fn the_last_event_wins_for_every_column() {
    let app = spawn_app().await;
    app.mount_file_content(FILE_ID, "Quarterly report draft.").await;
    app.mount_embedding(vec![0.5; EMBEDDING_DIMENSION]).await;

    let response = app
        .post_file_changed(file_changed_event(FILE_ID, "report.txt", 23))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    // Changed values replace the stored ones, fields missing from the event are cleared
    let second_event = json!({
        "data": {
            "id": FILE_ID,
            "remote_id": "7Hb2kQ0xZp",
            "created_at": "2022-01-10T09:00:00Z",
            "modified_at": "2022-01-11T10:30:00",
            "name": "final-report.txt",
            "file_url": "https://drive.example.com/files/final-report.txt",
            "size": 42
        }
    });
    let response = app.post_file_changed(second_event.to_string()).await;
    assert_eq!(response.status().as_u16(), 200);

    let files = app.merge_files().await;
    assert_eq!(files.len(), 1);
    let file = &files[0];
    assert_eq!(file.id, FILE_ID);
    assert_eq!(file.remote_id.as_deref(), Some("7Hb2kQ0xZp"));
    assert_eq!(
        file.created_at,
        Some(Utc.with_ymd_and_hms(2022, 1, 10, 9, 0, 0).unwrap())
    );
    assert_eq!(
        file.modified_at,
        Some(Utc.with_ymd_and_hms(2022, 1, 11, 10, 30, 0).unwrap())
    );
    assert_eq!(file.name.as_deref(), Some("final-report.txt"));
    assert_eq!(
        file.file_url.as_deref(),
        Some("https://drive.example.com/files/final-report.txt")
    );
    assert_eq!(file.size, Some(42));
    assert_eq!(file.file_thumbnail_url, None);
    assert_eq!(file.mime_type, None);
    assert_eq!(file.description, None);
    assert_eq!(file.remote_created_at, None);
    assert_eq!(file.remote_updated_at, None);
}

#[tokio::test]
async fn an_embedding_of_the_wrong_width_stores_nothing() {
    let app = spawn_app().await;
    app.mount_file_content(FILE_ID, "Quarterly report draft.").await;
    app.mount_embedding(vec![0.5; 3]).await;

    let response = app
        .post_file_changed(file_changed_event(FILE_ID, "report.txt", 23))
        .await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.expect("Failed to parse the body");
    assert_eq!(body["error"], "Database operation failed");
    assert!(app.merge_files().await.is_empty());
    assert!(app.file_embeddings().await.is_empty());
}

#[tokio::test]
async fn a_failed_download_returns_a_500_and_stores_nothing() {
    let app = spawn_app().await;
    // Nothing mounted on the Merge server: every download is a 404
    app.mount_embedding(vec![0.5; EMBEDDING_DIMENSION]).await;

    let response = app
        .post_file_changed(file_changed_event(FILE_ID, "report.txt", 23))
        .await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.expect("Failed to parse the body");
    assert_eq!(body["error"], "Failed to download the file content");
    assert!(app.merge_files().await.is_empty());
}

#[tokio::test]
async fn invalid_events_are_rejected_with_a_400() {
    let app = spawn_app().await;
    let test_cases = vec![
        ("{ not json".to_string(), "Invalid JSON payload"),
        (
            r#"{ "data": { "name": "report.txt" } }"#.to_string(),
            "No 'id' field provided in the payload.",
        ),
        (r#"{ "hook": {} }"#.to_string(), "No 'id' field provided in the payload."),
    ];

    for (body, error) in test_cases {
        let response = app.post_file_changed(body.clone()).await;

        assert_eq!(
            response.status().as_u16(),
            400,
            "The API did not fail with 400 Bad Request when the payload was {}.",
            body
        );
        let response_body: Value = response.json().await.expect("Failed to parse the body");
        assert_eq!(response_body["error"], error);
    }

    assert!(app.merge_files().await.is_empty());
}
