//! E2E tests for the browse page and browse session events

mod common;

use common::{TestServer, archive_post};
use serde_json::json;

fn card_count(body: &str) -> usize {
    body.matches("class=\"post-card\"").count()
}

async fn seed_game_posts(server: &TestServer, count: u32) {
    server
        .seed_archive((1..=count).map(|n| archive_post(n, &format!("Game idea {n}"), "GPT-4", &["game"])))
        .await;
}

/// Session cookie issued by `GET /browse`
async fn open_session(server: &TestServer, query: &str) -> String {
    let response = server
        .client
        .get(server.url(&format!("/browse{query}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let cookie = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("browse_session="))
        .expect("browse session cookie is set")
        .split(';')
        .next()
        .unwrap()
        .to_string();
    cookie
}

#[tokio::test]
async fn test_root_redirects_to_browse() {
    let server = TestServer::new().await;

    let response = server.client.get(server.url("/")).send().await.unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers()["location"], "/browse");
}

#[tokio::test]
async fn test_second_page_of_search_results() {
    let server = TestServer::new().await;
    seed_game_posts(&server, 25).await;

    let response = server
        .client
        .get(server.url("/browse?q=game&page=2"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert_eq!(card_count(&body), 12);
    assert!(body.contains("Showing 13-24 of 25 archive posts"));
    // Newest first: page 2 starts at the 13th newest post
    assert!(body.contains("data-post-id=\"p013\""));
    assert!(!body.contains("data-post-id=\"p025\""));
    assert!(body.contains("aria-current=\"page\">2<"));
}

#[tokio::test]
async fn test_tags_are_alternatives() {
    let server = TestServer::new().await;
    server
        .seed_archive([
            archive_post(1, "Pathfinding", "Claude 3", &["game"]),
            archive_post(2, "Writing tests", "Gemini Pro", &["rust"]),
            archive_post(3, "Recipes", "GPT-4", &["cooking"]),
        ])
        .await;

    let body = server
        .client
        .get(server.url("/browse?tag=game&tag=rust"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(card_count(&body), 2);
    assert!(body.contains("Pathfinding"));
    assert!(body.contains("Writing tests"));
    assert!(!body.contains("data-post-id=\"p003\""));
}

#[tokio::test]
async fn test_inverted_date_range_is_empty() {
    let server = TestServer::new().await;
    seed_game_posts(&server, 3).await;

    let body = server
        .client
        .get(server.url("/browse?date_from=2024-02-01&date_to=2024-01-01"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(card_count(&body), 0);
    assert!(body.contains("No archive posts found"));
}

#[tokio::test]
async fn test_invalid_filters_render_error_page() {
    let server = TestServer::new().await;

    for query in ["views_min=abc", "views_min=10&views_max=5", "page=0"] {
        let response = server
            .client
            .get(server.url(&format!("/browse?{query}")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "query {query}");
    }
}

#[tokio::test]
async fn test_user_text_is_escaped() {
    let server = TestServer::new().await;
    server
        .seed_archive([archive_post(1, "<script>alert(1)</script>", "GPT-4", &["game"])])
        .await;

    let body = server
        .client
        .get(server.url("/browse"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(!body.contains("<script>alert(1)</script>"));
    assert!(body.contains("&lt;script&gt;"));
}

#[tokio::test]
async fn test_session_events_filter_and_page() {
    let server = TestServer::new().await;
    seed_game_posts(&server, 25).await;
    let cookie = open_session(&server, "").await;

    let next = server
        .client
        .post(server.url("/browse/session/events"))
        .header("cookie", &cookie)
        .json(&json!({"event": "next_page"}))
        .send()
        .await
        .unwrap();
    assert_eq!(next.status(), 200);
    let body = next.text().await.unwrap();
    assert!(body.contains("Showing 13-24 of 25 archive posts"));

    // A filter change returns to page 1
    let filtered = server
        .client
        .post(server.url("/browse/session/events"))
        .header("cookie", &cookie)
        .json(&json!({"event": "set_filters", "views_min": "20"}))
        .send()
        .await
        .unwrap();
    assert_eq!(filtered.status(), 200);
    let body = filtered.text().await.unwrap();
    assert_eq!(card_count(&body), 6);
    assert!(body.contains("Showing 1-6 of 6 archive posts"));

    // Single page: nothing after it
    let past_end = server
        .client
        .post(server.url("/browse/session/events"))
        .header("cookie", &cookie)
        .json(&json!({"event": "next_page"}))
        .send()
        .await
        .unwrap();
    assert_eq!(past_end.status(), 204);
}

#[tokio::test]
async fn test_invalid_event_is_rejected_without_changing_session() {
    let server = TestServer::new().await;
    seed_game_posts(&server, 3).await;
    let cookie = open_session(&server, "").await;

    let rejected = server
        .client
        .post(server.url("/browse/session/events"))
        .header("cookie", &cookie)
        .json(&json!({"event": "go_to_page", "page": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 400);
    let error: serde_json::Value = rejected.json().await.unwrap();
    assert_eq!(error["error"], "Page must be at least 1");

    let refreshed = server
        .client
        .post(server.url("/browse/session/events"))
        .header("cookie", &cookie)
        .json(&json!({"event": "refresh"}))
        .send()
        .await
        .unwrap();
    assert_eq!(refreshed.status(), 200);
    assert_eq!(card_count(&refreshed.text().await.unwrap()), 3);
}

#[tokio::test]
async fn test_rapid_keystrokes_query_once() {
    let server = TestServer::new().await;
    seed_game_posts(&server, 3).await;
    let cookie = open_session(&server, "").await;

    let keystroke = |term: &'static str| {
        server
            .client
            .post(server.url("/browse/session/events"))
            .header("cookie", &cookie)
            .json(&json!({"event": "search_input", "term": term}))
            .send()
    };

    let first = keystroke("ga");
    let second = async {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        keystroke("game").await
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap().status(), 204);
    let second = second.unwrap();
    assert_eq!(second.status(), 200);
    assert_eq!(card_count(&second.text().await.unwrap()), 3);
}

#[tokio::test]
async fn test_popular_tags_endpoint() {
    let server = TestServer::new().await;
    server
        .seed_archive([
            archive_post(1, "A", "GPT-4", &["game", "ai"]),
            archive_post(2, "B", "GPT-4", &["game"]),
        ])
        .await;

    let tags: serde_json::Value = server
        .client
        .get(server.url("/api/tags/popular"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(tags[0]["tag"], "game");
    assert_eq!(tags[0]["count"], 2);
    assert_eq!(tags[1]["tag"], "ai");
}

/// Card ids in page order
fn post_ids(body: &str) -> Vec<&str> {
    body.split("data-post-id=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .collect()
}

async fn browse_ids(server: &TestServer, query: &str) -> Vec<String> {
    let response = server
        .client
        .get(server.url(&format!("/browse{query}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200, "query {query}");
    let body = response.text().await.unwrap();
    post_ids(&body).into_iter().map(str::to_string).collect()
}

#[tokio::test]
async fn test_content_type_filter() {
    let server = TestServer::new().await;
    let mut embedded = archive_post(2, "Shared chat", "Claude 3", &["chat"]);
    embedded["content"] = json!(null);
    embedded["embed_url"] = json!("https://chat.example.com/share/2");
    server
        .seed_archive([archive_post(1, "Inline notes", "GPT-4", &["notes"]), embedded])
        .await;

    assert_eq!(browse_ids(&server, "?content_type=text").await, ["p001"]);
    assert_eq!(browse_ids(&server, "?content_type=embedded").await, ["p002"]);
    assert_eq!(browse_ids(&server, "?content_type=all").await, ["p002", "p001"]);
}

#[tokio::test]
async fn test_prompt_visibility_filter() {
    let server = TestServer::new().await;
    let mut private = archive_post(2, "Hidden prompt", "GPT-4", &["game"]);
    private["prompt_is_public"] = json!(false);
    server
        .seed_archive([archive_post(1, "Open prompt", "GPT-4", &["game"]), private])
        .await;

    assert_eq!(browse_ids(&server, "?prompt_visibility=public").await, ["p001"]);
    assert_eq!(browse_ids(&server, "?prompt_visibility=private").await, ["p002"]);
}

#[tokio::test]
async fn test_view_range_bounds_are_inclusive() {
    let server = TestServer::new().await;
    // views equal n
    seed_game_posts(&server, 12).await;

    let ids = browse_ids(&server, "?views_min=5&views_max=8").await;
    assert_eq!(ids, ["p008", "p007", "p006", "p005"]);
}

#[tokio::test]
async fn test_oldest_and_most_viewed_orders() {
    let server = TestServer::new().await;
    let mut popular = archive_post(1, "Old but popular", "GPT-4", &["game"]);
    popular["views"] = json!(500);
    server
        .seed_archive([
            popular,
            archive_post(2, "Middle", "GPT-4", &["game"]),
            archive_post(3, "Newest", "GPT-4", &["game"]),
        ])
        .await;

    assert_eq!(browse_ids(&server, "?sort=newest").await, ["p003", "p002", "p001"]);
    assert_eq!(browse_ids(&server, "?sort=oldest").await, ["p001", "p002", "p003"]);
    assert_eq!(
        browse_ids(&server, "?sort=most-viewed").await,
        ["p001", "p003", "p002"]
    );
}

#[tokio::test]
async fn test_repeated_query_returns_same_page() {
    let server = TestServer::new().await;
    let mut posts: Vec<_> = (1..=20)
        .map(|n| archive_post(n, &format!("Game idea {n}"), "GPT-4", &["game"]))
        .collect();
    // Ties on views must still page in a stable order
    for post in &mut posts {
        post["views"] = json!(7);
    }
    server.seed_archive(posts).await;

    let query = "?q=game&sort=most-viewed&page=2";
    let first = server
        .client
        .get(server.url(&format!("/browse{query}")))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let second = server
        .client
        .get(server.url(&format!("/browse{query}")))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(post_ids(&first).len(), 8);
    assert_eq!(post_ids(&first), post_ids(&second));
    assert!(first.contains("Showing 13-20 of 20 archive posts"));
    assert!(second.contains("Showing 13-20 of 20 archive posts"));
}

#[tokio::test]
async fn test_search_ignores_embedded_posts_without_text() {
    let server = TestServer::new().await;
    let token = server.token("writer");

    let response = server
        .client
        .post(server.url("/publish/archive"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Chess openings",
            "ai_model": "Claude 3",
            "prompt": "List openings",
            "embed_url": "https://chat.example.com/s/1",
            "tags": ["chess"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    for term in ["embedded+link", "available"] {
        let body = server
            .client
            .get(server.url(&format!("/browse?q={term}")))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(post_ids(&body).is_empty(), "term {term}");
        assert!(body.contains("No archive posts found"));
    }
    assert_eq!(browse_ids(&server, "?q=chess").await.len(), 1);
}
