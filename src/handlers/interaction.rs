use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::posts::load_post_view,
    models::post::{
        Comment, CommentVoteRequest, CreateCommentRequest, DeleteCommentRequest, Post, Reply,
        VoteRequest, apply_vote,
    },
    utils::{html::clean_html, jwt::Claims},
};

/// Casts, switches or removes the caller's vote on a post.
pub async fn vote_post(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(post_id): Path<i64>,
    Json(payload): Json<VoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut post = Post::fetch(&pool, post_id).await?;

    apply_vote(
        &mut post.upvotes.0,
        &mut post.downvotes.0,
        claims.user_id(),
        payload.vote,
    );

    // Whole-list write; concurrent votes on the same post are
    // last-write-wins.
    post.save(&pool).await?;

    let view = load_post_view(&pool, &post).await?;

    Ok(Json(json!({ "message": "Vote updated", "post": view })))
}

/// Adds a comment, or a reply when `parent_comment_id` is set.
pub async fn add_comment(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let text = payload.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Comment text is required".to_string()));
    }
    let text = clean_html(text);

    let mut post = Post::fetch(&pool, post_id).await?;
    let user_id = claims.user_id();

    match payload.parent_comment_id {
        Some(parent_id) => {
            let parent = post
                .comment_mut(parent_id)
                .ok_or(AppError::NotFound("Parent comment not found".to_string()))?;
            parent.replies.push(Reply::new(user_id, text));
        }
        None => {
            post.comments.0.push(Comment::new(user_id, text));
        }
    }

    post.save(&pool).await?;

    let view = load_post_view(&pool, &post).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Comment added", "post": view })),
    ))
}

/// Casts, switches or removes the caller's vote on a comment or reply.
pub async fn vote_comment(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path((post_id, comment_id)): Path<(i64, Uuid)>,
    Json(payload): Json<CommentVoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut post = Post::fetch(&pool, post_id).await?;
    let user_id = claims.user_id();

    match payload.parent_comment_id {
        Some(parent_id) => {
            let parent = post
                .comment_mut(parent_id)
                .ok_or(AppError::NotFound("Parent comment not found".to_string()))?;
            let reply = parent
                .reply_mut(comment_id)
                .ok_or(AppError::NotFound("Comment not found".to_string()))?;
            if reply.is_deleted {
                return Err(AppError::BadRequest(
                    "Cannot vote on a deleted comment".to_string(),
                ));
            }
            apply_vote(&mut reply.upvotes, &mut reply.downvotes, user_id, payload.vote);
        }
        None => {
            let comment = post
                .comment_mut(comment_id)
                .ok_or(AppError::NotFound("Comment not found".to_string()))?;
            if comment.is_deleted {
                return Err(AppError::BadRequest(
                    "Cannot vote on a deleted comment".to_string(),
                ));
            }
            apply_vote(
                &mut comment.upvotes,
                &mut comment.downvotes,
                user_id,
                payload.vote,
            );
        }
    }

    post.save(&pool).await?;

    let view = load_post_view(&pool, &post).await?;

    Ok(Json(json!({ "message": "Vote updated", "post": view })))
}

/// Soft-deletes a comment or reply. Author only.
///
/// The node keeps its position and replies; only the text and flag change.
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path((post_id, comment_id)): Path<(i64, Uuid)>,
    Json(payload): Json<DeleteCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut post = Post::fetch(&pool, post_id).await?;
    let user_id = claims.user_id();

    match payload.parent_comment_id {
        Some(parent_id) => {
            let parent = post
                .comment_mut(parent_id)
                .ok_or(AppError::NotFound("Parent comment not found".to_string()))?;
            let reply = parent
                .reply_mut(comment_id)
                .ok_or(AppError::NotFound("Comment not found".to_string()))?;
            if reply.author != user_id {
                return Err(AppError::Forbidden("Not allowed".to_string()));
            }
            reply.soft_delete();
        }
        None => {
            let comment = post
                .comment_mut(comment_id)
                .ok_or(AppError::NotFound("Comment not found".to_string()))?;
            if comment.author != user_id {
                return Err(AppError::Forbidden("Not allowed".to_string()));
            }
            comment.soft_delete();
        }
    }

    post.save(&pool).await?;

    let view = load_post_view(&pool, &post).await?;

    Ok(Json(json!({ "message": "Comment deleted", "post": view })))
}
