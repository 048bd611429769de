use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::{SEARCH_COMMUNITY_LIMIT, SEARCH_POST_LIMIT},
    error::AppError,
    models::{
        community::Community,
        post::{CommunityRef, CreatePostRequest, Post, PostListParams, PostSummary, PostView,
               UpdatePostRequest},
        user::User,
    },
    ranking::{self, SortOrder},
    state::AppState,
    summarize,
    utils::{html::clean_html, jwt::Claims},
};

/// Builds the fully populated view of one post.
pub(crate) async fn load_post_view(pool: &SqlitePool, post: &Post) -> Result<PostView, AppError> {
    let community_name =
        sqlx::query_scalar::<_, String>("SELECT name FROM communities WHERE id = ?")
            .bind(post.community_id)
            .fetch_optional(pool)
            .await?
            .unwrap_or_default();

    let usernames = User::username_map(pool, &post.referenced_user_ids()).await?;

    Ok(PostView::build(
        post,
        CommunityRef {
            id: post.community_id,
            name: community_name,
        },
        &usernames,
    ))
}

/// Builds list-item summaries for a batch of posts.
async fn load_post_summaries(
    pool: &SqlitePool,
    posts: &[Post],
) -> Result<Vec<PostSummary>, AppError> {
    let community_ids: Vec<i64> = posts.iter().map(|p| p.community_id).collect();
    let names = Community::name_map(pool, &community_ids).await?;

    let creator_ids: Vec<i64> = posts.iter().map(|p| p.creator_id).collect();
    let usernames = User::username_map(pool, &creator_ids).await?;

    Ok(posts
        .iter()
        .map(|p| {
            PostSummary::build(
                p,
                CommunityRef {
                    id: p.community_id,
                    name: names.get(&p.community_id).cloned().unwrap_or_default(),
                },
                &usernames,
            )
        })
        .collect())
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Searches communities by name and posts by title/content,
/// case-insensitively.
pub async fn search(
    State(pool): State<SqlitePool>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let term = params.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Ok(Json(json!({ "communities": [], "posts": [] })));
    }

    let pattern = RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let communities =
        sqlx::query_as::<_, Community>("SELECT * FROM communities ORDER BY created_at DESC")
            .fetch_all(&pool)
            .await?;
    let matched_communities: Vec<Community> = communities
        .into_iter()
        .filter(|c| pattern.is_match(&c.name))
        .take(SEARCH_COMMUNITY_LIMIT)
        .collect();

    let posts = sqlx::query_as::<_, Post>("SELECT * FROM posts ORDER BY created_at DESC")
        .fetch_all(&pool)
        .await?;
    let matched_posts: Vec<Post> = posts
        .into_iter()
        .filter(|p| pattern.is_match(&p.title) || pattern.is_match(&p.content))
        .take(SEARCH_POST_LIMIT)
        .collect();

    let post_views = load_post_summaries(&pool, &matched_posts).await?;

    Ok(Json(json!({
        "communities": matched_communities,
        "posts": post_views,
    })))
}

/// Creates a post in an existing community.
pub async fn create_post(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // Images arrive either as a regular URL or as an inline base64 data URL.
    if let Some(image) = payload.image_url.as_deref().filter(|s| !s.is_empty()) {
        if !image.starts_with("data:") && url::Url::parse(image).is_err() {
            return Err(AppError::BadRequest("Invalid image URL".to_string()));
        }
    }

    let mut community = Community::fetch(&pool, payload.community_id).await?;
    let user_id = claims.user_id();

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO posts (title, content, image_url, community_id, creator_id, upvotes, downvotes, comments, created_at)
        VALUES (?, ?, ?, ?, ?, '[]', '[]', '[]', ?)
        RETURNING id
        "#,
    )
    .bind(&payload.title)
    .bind(clean_html(&payload.content))
    .bind(payload.image_url.as_deref().filter(|s| !s.is_empty()))
    .bind(community.id)
    .bind(user_id)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::from(e)
    })?;

    // Track the post id on the community document. Read-modify-write, so a
    // concurrent create can drop one id from the list (last write wins).
    community.posts.push(id);
    sqlx::query("UPDATE communities SET posts = ? WHERE id = ?")
        .bind(&community.posts)
        .bind(community.id)
        .execute(&pool)
        .await?;

    let post = Post::fetch(&pool, id).await?;
    let view = load_post_view(&pool, &post).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Post created successfully", "post": view })),
    ))
}

/// Lists posts, optionally filtered by community or creator, ordered by the
/// requested ranking.
pub async fn list_posts(
    State(pool): State<SqlitePool>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT * FROM posts
        WHERE (?1 IS NULL OR community_id = ?1)
          AND (?2 IS NULL OR creator_id = ?2)
        ORDER BY created_at DESC
        "#,
    )
    .bind(params.community_id)
    .bind(params.creator_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list posts: {:?}", e);
        AppError::from(e)
    })?;

    let mut views = load_post_summaries(&pool, &posts).await?;

    let order = SortOrder::parse(params.sort.as_deref());
    ranking::sort_posts(&mut views, order, chrono::Utc::now());

    Ok(Json(views))
}

#[derive(Debug, Deserialize)]
pub struct PostDetailParams {
    /// Optional ordering for the top-level comments.
    pub sort: Option<String>,
}

/// Returns a single post, fully populated.
pub async fn get_post(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Query(params): Query<PostDetailParams>,
) -> Result<impl IntoResponse, AppError> {
    let post = Post::fetch(&pool, id).await?;

    let mut view = load_post_view(&pool, &post).await?;

    let order = SortOrder::parse(params.sort.as_deref());
    ranking::sort_comments(&mut view.comments, order, chrono::Utc::now());

    Ok(Json(view))
}

/// Updates a post's title and/or content. Author only.
pub async fn update_post(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut post = Post::fetch(&pool, id).await?;

    if post.creator_id != claims.user_id() {
        return Err(AppError::Forbidden("Not allowed".to_string()));
    }

    if let Some(title) = payload.title.as_deref().filter(|t| !t.trim().is_empty()) {
        post.title = title.to_string();
    }
    if let Some(content) = payload.content.as_deref().filter(|c| !c.trim().is_empty()) {
        post.content = clean_html(content);
    }

    post.save(&pool).await?;

    let view = load_post_view(&pool, &post).await?;

    Ok(Json(json!({ "message": "Post updated", "post": view })))
}

#[derive(Debug, Deserialize)]
pub struct SummarizeParams {
    /// Bypass the cached summary.
    #[serde(default)]
    pub force: bool,
}

/// Summarizes a post's content, caching the result on the post document.
pub async fn summarize_post(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<i64>,
    Query(params): Query<SummarizeParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut post = Post::fetch(&state.pool, id).await?;

    let text = if post.content.trim().is_empty() {
        post.title.trim().to_string()
    } else {
        post.content.trim().to_string()
    };
    if text.is_empty() {
        return Err(AppError::BadRequest("Post has no content".to_string()));
    }

    if let Some(cached) = post.ai_summary.as_ref().filter(|_| !params.force) {
        return Ok(Json(json!({
            "summary": cached.text,
            "source": cached.source,
        })));
    }

    let summary = summarize::summarize(&state.http, &state.config, &text).await?;

    post.ai_summary = Some(sqlx::types::Json(summary.clone()));
    post.save(&state.pool).await?;

    Ok(Json(json!({
        "summary": summary.text,
        "source": summary.source,
    })))
}
