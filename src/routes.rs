// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    routing::{delete, get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::MAX_JSON_BODY_BYTES,
    handlers::{auth, communities, interaction, posts},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, communities, posts).
/// * Applies global middleware (Trace, CORS, body limit).
/// * Injects global state (pool, config, HTTP client).
///
/// Protected handlers declare a `Claims` argument; there is no separate
/// middleware stack for them.
pub fn create_router(state: AppState) -> Router {
    // Bearer-token auth, no cookies, so any origin is acceptable.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/update-bio", put(auth::update_bio))
        .route("/update-profile", put(auth::update_profile))
        .route("/follow/{user_id}", put(auth::follow_user))
        .route("/user/{user_id}", get(auth::get_user))
        .route("/search", get(auth::search_users));

    let community_routes = Router::new()
        .route(
            "/",
            get(communities::list_communities).post(communities::create_community),
        )
        .route(
            "/{id}",
            get(communities::get_community).delete(communities::delete_community),
        )
        .route("/{id}/join", put(communities::join_community));

    let post_routes = Router::new()
        .route("/search", get(posts::search))
        .route("/", get(posts::list_posts).post(posts::create_post))
        .route("/{id}", get(posts::get_post).put(posts::update_post))
        .route("/{id}/vote", put(interaction::vote_post))
        .route("/{id}/summarize", post(posts::summarize_post))
        .route("/{id}/comment", post(interaction::add_comment))
        .route(
            "/{id}/comment/{comment_id}",
            delete(interaction::delete_comment),
        )
        .route(
            "/{id}/comment/{comment_id}/vote",
            put(interaction::vote_comment),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/communities", community_routes)
        .nest("/api/posts", post_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_JSON_BODY_BYTES))
        .with_state(state)
}
