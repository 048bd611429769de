// tests/api_tests.rs

use nestboard::{config::Config, routes, state::AppState};
use sqlx::sqlite::SqlitePoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // In-memory SQLite; a single pooled connection keeps every query on the
    // same database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        port: 0,
        gemini_api_key: None,
        gemini_api_url: None,
    };

    let state = AppState {
        pool,
        config,
        http: reqwest::Client::new(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Registers a user and returns (token, user id).
async fn register_user(client: &reqwest::Client, address: &str, username: &str) -> (String, i64) {
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();

    (
        body["token"].as_str().expect("Token not found").to_string(),
        body["user"]["id"].as_i64().expect("User id not found"),
    )
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works_and_hides_password() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["token"].is_string());
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "email": "yo@example.com",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn register_rejects_taken_username() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&client, &address, "taken_name").await;

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "taken_name",
            "email": "other@example.com",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn login_works_with_email_or_username() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&client, &address, "bob").await;

    for identifier in ["bob", "bob@example.com"] {
        let response = client
            .post(format!("{}/api/auth/login", address))
            .json(&serde_json::json!({
                "email_or_username": identifier,
                "password": "password123"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["token"].is_string());
        assert_eq!(body["user"]["username"], "bob");
    }
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&client, &address, "carol").await;

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "email_or_username": "carol",
            "password": "not_the_password"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn me_requires_valid_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (token, _) = register_user(&client, &address, "dave").await;

    // No token
    let response = client
        .get(format!("{}/api/auth/me", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // Garbage token
    let response = client
        .get(format!("{}/api/auth/me", address))
        .header("Authorization", "Bearer garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // Valid token
    let response = client
        .get(format!("{}/api/auth/me", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["username"], "dave");
}

#[tokio::test]
async fn update_bio_and_profile() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (token, _) = register_user(&client, &address, "erin").await;

    // Update bio (script tags are sanitized away)
    let response = client
        .put(format!("{}/api/auth/update-bio", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "bio": "I like <script>alert(1)</script>links" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let bio = body["user"]["bio"].as_str().unwrap();
    assert!(!bio.contains("script"));
    assert!(bio.contains("links"));

    // Change password; requires the current one
    let response = client
        .put(format!("{}/api/auth/update-profile", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "new_password": "newpassword123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .put(format!("{}/api/auth/update-profile", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "current_password": "password123",
            "new_password": "newpassword123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Old password no longer logs in
    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "email_or_username": "erin",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "email_or_username": "erin",
            "password": "newpassword123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn follow_toggles_both_lists() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (token_a, id_a) = register_user(&client, &address, "follower").await;
    let (_, id_b) = register_user(&client, &address, "followee").await;

    // Self-follow is rejected
    let response = client
        .put(format!("{}/api/auth/follow/{}", address, id_a))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Follow
    let response = client
        .put(format!("{}/api/auth/follow/{}", address, id_b))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Followed user");
    assert_eq!(body["following"], serde_json::json!([id_b]));

    // The target's public profile shows the follower, with username resolved
    let response = client
        .get(format!("{}/api/auth/user/{}", address, id_b))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["followers"][0]["id"], id_a);
    assert_eq!(body["user"]["followers"][0]["username"], "follower");

    // Follow again -> unfollow
    let response = client
        .put(format!("{}/api/auth/follow/{}", address, id_b))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Unfollowed user");
    assert_eq!(body["following"], serde_json::json!([]));
}

#[tokio::test]
async fn search_users_matches_case_insensitively() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&client, &address, "RustLover").await;
    register_user(&client, &address, "pythonista").await;

    let response = client
        .get(format!("{}/api/auth/search?q=rust", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["username"], "RustLover");

    // Empty query returns an empty list, not everything
    let response = client
        .get(format!("{}/api/auth/search?q=", address))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["users"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn community_crud_and_membership() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (token_a, id_a) = register_user(&client, &address, "founder").await;
    let (token_b, _) = register_user(&client, &address, "joiner").await;

    // Create requires auth
    let response = client
        .post(format!("{}/api/communities", address))
        .json(&serde_json::json!({ "name": "rustaceans", "description": "all things rust" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // Create
    let response = client
        .post(format!("{}/api/communities", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "name": "rustaceans", "description": "all things rust" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let community: serde_json::Value = response.json().await.unwrap();
    let community_id = community["id"].as_i64().unwrap();
    assert_eq!(community["members"], serde_json::json!([id_a]));

    // Duplicate name
    let response = client
        .post(format!("{}/api/communities", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "name": "rustaceans", "description": "again" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // The creator auto-joined
    let response = client
        .get(format!("{}/api/auth/me", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["joined_communities"], serde_json::json!(["rustaceans"]));

    // Join as B
    let response = client
        .put(format!("{}/api/communities/{}/join", address, community_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Joined community");
    assert_eq!(body["community"]["members"].as_array().unwrap().len(), 2);

    // Populated view resolves member usernames
    let response = client
        .get(format!("{}/api/communities/{}", address, community_id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    let members = body["members"].as_array().unwrap();
    assert!(members.iter().any(|m| m["username"] == "joiner"));
    assert_eq!(body["creator"]["username"], "founder");

    // Leave again
    let response = client
        .put(format!("{}/api/communities/{}/join", address, community_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Left community");
    assert_eq!(body["community"]["members"].as_array().unwrap().len(), 1);

    // Only the creator can delete
    let response = client
        .delete(format!("{}/api/communities/{}", address, community_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .delete(format!("{}/api/communities/{}", address, community_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .get(format!("{}/api/communities/{}", address, community_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn post_crud_and_ownership() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (token_a, _) = register_user(&client, &address, "author").await;
    let (token_b, _) = register_user(&client, &address, "lurker").await;

    let response = client
        .post(format!("{}/api/communities", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "name": "linkboard", "description": "" }))
        .send()
        .await
        .unwrap();
    let community_id = response.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    // Unknown community
    let response = client
        .post(format!("{}/api/posts", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({
            "title": "hello",
            "content": "world",
            "community_id": 9999
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // Create
    let response = client
        .post(format!("{}/api/posts", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({
            "title": "First post",
            "content": "Some content here.",
            "community_id": community_id
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    let post_id = body["post"]["id"].as_i64().unwrap();
    assert_eq!(body["post"]["community"]["name"], "linkboard");
    assert_eq!(body["post"]["creator"]["username"], "author");

    // The community view lists it
    let response = client
        .get(format!("{}/api/communities/{}", address, community_id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["posts"].as_array().unwrap().len(), 1);

    // Filtered listing
    let response = client
        .get(format!("{}/api/posts?community_id={}", address, community_id))
        .send()
        .await
        .unwrap();
    let posts: serde_json::Value = response.json().await.unwrap();
    assert_eq!(posts.as_array().unwrap().len(), 1);
    assert_eq!(posts[0]["title"], "First post");

    // Only the author can update
    let response = client
        .put(format!("{}/api/posts/{}", address, post_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({ "title": "hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .put(format!("{}/api/posts/{}", address, post_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "title": "First post, edited" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["post"]["title"], "First post, edited");
}

#[tokio::test]
async fn search_finds_communities_and_posts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (token, _) = register_user(&client, &address, "searcher").await;

    let response = client
        .post(format!("{}/api/communities", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "name": "rustaceans", "description": "" }))
        .send()
        .await
        .unwrap();
    let community_id = response.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    client
        .post(format!("{}/api/posts", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "title": "Learning Rust the hard way",
            "content": "borrow checker adventures",
            "community_id": community_id
        }))
        .send()
        .await
        .unwrap();

    let response = client
        .get(format!("{}/api/posts/search?q=RUST", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["communities"].as_array().unwrap().len(), 1);
    assert_eq!(body["posts"].as_array().unwrap().len(), 1);

    // Content matches too
    let response = client
        .get(format!("{}/api/posts/search?q=borrow+checker", address))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["posts"].as_array().unwrap().len(), 1);
    assert_eq!(body["communities"].as_array().unwrap().len(), 0);
}
