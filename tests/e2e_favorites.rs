//! E2E tests for favorites

mod common;

use common::{TestServer, archive_post};
use serde_json::{Value, json};

async fn seed(server: &TestServer) {
    server
        .seed_archive([archive_post(1, "Game AI", "GPT-4", &["game"])])
        .await;
    server
        .seed_collab([json!({
            "id": "c1", "user_id": "author-1", "type": "request",
            "title": "Need a reviewer", "description": "Prompt review wanted",
            "contact_email": "author@example.com", "tags": ["review"],
            "created_at": "2024-01-02T00:00:00Z",
        })])
        .await;
}

#[tokio::test]
async fn test_favorite_requires_sign_in() {
    let server = TestServer::new().await;
    seed(&server).await;

    let response = server
        .client
        .post(server.url("/posts/archive/p001/favorite"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_duplicate_favorite_conflicts_without_counting() {
    let server = TestServer::new().await;
    seed(&server).await;
    let token = server.token("reader");

    let added = server
        .client
        .post(server.url("/posts/archive/p001/favorite"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(added.status(), 200);
    let change: Value = added.json().await.unwrap();
    assert_eq!(change["favorited"], true);
    assert_eq!(change["favorite_count"]["value"], 1);

    let duplicate = server
        .client
        .post(server.url("/posts/archive/p001/favorite"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), 409);
    let error: Value = duplicate.json().await.unwrap();
    assert_eq!(error["error"], "This post is already in your favorites");

    assert_eq!(server.archive_row("p001").await["favorite_count"], 1);
}

#[tokio::test]
async fn test_remove_favorite_decrements() {
    let server = TestServer::new().await;
    seed(&server).await;
    let token = server.token("reader");

    server
        .client
        .post(server.url("/posts/archive/p001/favorite"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let removed = server
        .client
        .delete(server.url("/posts/archive/p001/favorite"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(removed.status(), 200);
    let change: Value = removed.json().await.unwrap();
    assert_eq!(change["favorited"], false);
    assert_eq!(server.archive_row("p001").await["favorite_count"], 0);
}

#[tokio::test]
async fn test_favorites_page_filters_by_kind() {
    let server = TestServer::new().await;
    seed(&server).await;
    let token = server.token("reader");

    for path in ["/posts/archive/p001/favorite", "/posts/collab/c1/favorite"] {
        let response = server
            .client
            .post(server.url(path))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let all = server
        .client
        .get(server.url("/favorites"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(all.contains("Game AI"));
    assert!(all.contains("Need a reviewer"));

    let collab = server
        .client
        .get(server.url("/favorites?filter=collab"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!collab.contains("Game AI"));
    assert!(collab.contains("Need a reviewer"));
    assert!(collab.contains("Looking for collaboration"));
}

#[tokio::test]
async fn test_favorites_page_requires_sign_in() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/favorites"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_remove_by_id_is_owner_only() {
    let server = TestServer::new().await;
    seed(&server).await;
    let token = server.token("reader");

    server
        .client
        .post(server.url("/posts/collab/c1/favorite"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let favorite_id = server
        .state
        .favorites
        .list("reader", None)
        .await
        .unwrap()[0]
        .id
        .clone();

    let stranger = server
        .client
        .delete(server.url(&format!("/favorites/{favorite_id}")))
        .bearer_auth(server.token("stranger"))
        .send()
        .await
        .unwrap();
    assert_eq!(stranger.status(), 404);

    let owner = server
        .client
        .delete(server.url(&format!("/favorites/{favorite_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(owner.status(), 204);
}

#[tokio::test]
async fn test_browse_marks_favorited_posts() {
    let server = TestServer::new().await;
    seed(&server).await;
    let token = server.token("reader");

    server
        .client
        .post(server.url("/posts/archive/p001/favorite"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    let body = server
        .client
        .get(server.url("/browse"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("favorites favorited"));
}
