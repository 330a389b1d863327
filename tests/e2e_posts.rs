//! E2E tests for post pages, downloads, publishing and editing

mod common;

use common::{TestServer, archive_post};
use serde_json::json;

#[tokio::test]
async fn test_post_page_counts_views() {
    let server = TestServer::new().await;
    server
        .seed_archive([archive_post(4, "Game AI", "GPT-4", &["game"])])
        .await;

    let response = server
        .client
        .get(server.url("/posts/archive/p004"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("Game AI"));
    assert!(body.contains("Author One"));
    assert_eq!(server.archive_row("p004").await["views"], 5);
}

#[tokio::test]
async fn test_missing_post_renders_not_found_page() {
    let server = TestServer::new().await;

    for path in ["/posts/archive/nope", "/posts/status/1"] {
        let response = server.client.get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 404, "path {path}");
        let body = response.text().await.unwrap();
        assert!(body.contains("Post not found or no longer available."));
    }
}

#[tokio::test]
async fn test_private_prompt_is_not_shown() {
    let server = TestServer::new().await;
    let mut post = archive_post(1, "Secret sauce", "Claude 3", &["game"]);
    post["prompt"] = json!("do not reveal");
    post["prompt_is_public"] = json!(false);
    server.seed_archive([post]).await;

    let body = server
        .client
        .get(server.url("/posts/archive/p001"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(!body.contains("do not reveal"));
}

#[tokio::test]
async fn test_download_text_export() {
    let server = TestServer::new().await;
    server
        .seed_archive([archive_post(1, "Game AI: v2", "GPT-4", &["game"])])
        .await;

    let response = server
        .client
        .post(server.url("/posts/archive/p001/download"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"Game_AI_v2.txt\""
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("Insight number 1"));
    assert_eq!(server.archive_row("p001").await["downloads"], 1);
}

#[tokio::test]
async fn test_download_embedded_post_redirects() {
    let server = TestServer::new().await;
    let mut post = archive_post(1, "Shared chat", "Claude 3", &["chat"]);
    post["content"] = json!("Content available via embedded link");
    post["embed_url"] = json!("http://chat.example.com/share/1");
    server.seed_archive([post]).await;

    let response = server
        .client
        .post(server.url("/posts/archive/p001/download"))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(
        response.headers()["location"],
        "https://chat.example.com/share/1"
    );
}

#[tokio::test]
async fn test_collab_posts_cannot_be_downloaded() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/posts/collab/c1/download"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_publish_requires_sign_in() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/publish/collab"))
        .json(&json!({
            "type": "offer", "title": "Pairing", "description": "Happy to help",
            "contact_email": "a@example.com", "tags": ["rust"]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_publish_archive_and_find_it_on_profile() {
    let server = TestServer::new().await;
    let token = server.token("writer");

    let response = server
        .client
        .post(server.url("/publish/archive"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Level design notes",
            "ai_model": "Claude 3",
            "prompt": "Design a level",
            "content": "Start small",
            "tags": [" Game ", "design"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let saved: serde_json::Value = response.json().await.unwrap();
    assert_eq!(saved["kind"], "archive");

    let profile = server
        .client
        .get(server.url("/profile"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(profile.contains("Level design notes"));

    // Popular tags pick up the new post immediately
    let tags: serde_json::Value = server
        .client
        .get(server.url("/api/tags/popular"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(
        tags.as_array()
            .unwrap()
            .iter()
            .any(|tag| tag["tag"] == "game")
    );
}

#[tokio::test]
async fn test_publish_rejects_invalid_tags() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/publish/archive"))
        .bearer_auth(server.token("writer"))
        .json(&json!({
            "title": "Too short",
            "ai_model": "GPT-4",
            "prompt": "p",
            "content": "c",
            "tags": ["a"]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_only_the_author_edits() {
    let server = TestServer::new().await;
    server
        .seed_archive([archive_post(1, "Original", "GPT-4", &["game"])])
        .await;
    let form = json!({
        "title": "Renamed",
        "ai_model": "GPT-4",
        "prompt": "p",
        "content": "c",
        "tags": ["game"]
    });

    let denied = server
        .client
        .put(server.url("/posts/archive/p001"))
        .bearer_auth(server.token("someone-else"))
        .json(&form)
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 403);

    let allowed = server
        .client
        .put(server.url("/posts/archive/p001"))
        .bearer_auth(server.token("author-1"))
        .json(&form)
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), 200);
    assert_eq!(server.archive_row("p001").await["title"], "Renamed");
}
