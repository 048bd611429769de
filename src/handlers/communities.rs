use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        community::{Community, CommunityView, CreateCommunityRequest},
        post::{CommunityRef, Post, PostSummary},
        user::{User, UserRef},
    },
    utils::{html::clean_html, jwt::Claims},
};

/// Builds the populated view: member usernames plus post summaries.
pub(crate) async fn load_community_view(
    pool: &SqlitePool,
    community: Community,
) -> Result<CommunityView, AppError> {
    let posts = sqlx::query_as::<_, Post>(
        "SELECT * FROM posts WHERE community_id = ? ORDER BY created_at DESC",
    )
    .bind(community.id)
    .fetch_all(pool)
    .await?;

    let mut ids: Vec<i64> = community.members.0.clone();
    ids.push(community.creator_id);
    ids.extend(posts.iter().map(|p| p.creator_id));
    let usernames = User::username_map(pool, &ids).await?;

    let community_ref = CommunityRef {
        id: community.id,
        name: community.name.clone(),
    };

    Ok(CommunityView {
        id: community.id,
        name: community.name,
        description: community.description,
        creator: UserRef::resolve(community.creator_id, &usernames),
        members: community
            .members
            .iter()
            .map(|&id| UserRef::resolve(id, &usernames))
            .collect(),
        posts: posts
            .iter()
            .map(|p| PostSummary::build(p, community_ref.clone(), &usernames))
            .collect(),
        created_at: community.created_at,
    })
}

/// Adds a community name to a user's joined list, or removes it.
async fn update_joined_communities(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    joined: bool,
) -> Result<(), AppError> {
    let mut user = User::fetch(pool, user_id).await?;

    if joined {
        if !user.joined_communities.contains(&name.to_string()) {
            user.joined_communities.push(name.to_string());
        }
    } else {
        user.joined_communities.retain(|n| n != name);
    }

    sqlx::query("UPDATE users SET joined_communities = ? WHERE id = ?")
        .bind(&user.joined_communities)
        .bind(user.id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Creates a community. The creator joins automatically.
pub async fn create_community(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Json(payload): Json<CreateCommunityRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id();

    // Uniqueness is check-then-insert; two concurrent creates can race and
    // the second insert then fails on the UNIQUE constraint.
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM communities WHERE name = ?")
        .bind(&payload.name)
        .fetch_optional(&pool)
        .await?;

    if exists.is_some() {
        return Err(AppError::BadRequest("Community already exists".to_string()));
    }

    let members = sqlx::types::Json(vec![user_id]);

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO communities (name, description, creator_id, members, posts, created_at)
        VALUES (?, ?, ?, ?, '[]', ?)
        RETURNING id
        "#,
    )
    .bind(&payload.name)
    .bind(clean_html(&payload.description))
    .bind(user_id)
    .bind(&members)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint") {
            AppError::BadRequest("Community already exists".to_string())
        } else {
            tracing::error!("Failed to create community: {:?}", e);
            AppError::from(e)
        }
    })?;

    update_joined_communities(&pool, user_id, &payload.name, true).await?;

    let community = Community::fetch(&pool, id).await?;

    Ok((StatusCode::CREATED, Json(community)))
}

/// Lists all communities, newest first.
pub async fn list_communities(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let communities =
        sqlx::query_as::<_, Community>("SELECT * FROM communities ORDER BY created_at DESC")
            .fetch_all(&pool)
            .await?;

    Ok(Json(communities))
}

/// Returns a single community with members and posts populated.
pub async fn get_community(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let community = Community::fetch(&pool, id).await?;

    let view = load_community_view(&pool, community).await?;

    Ok(Json(view))
}

/// Toggles membership for the current user.
pub async fn join_community(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();
    let mut community = Community::fetch(&pool, id).await?;

    let is_member = community.members.contains(&user_id);

    if is_member {
        community.members.retain(|&m| m != user_id);
    } else {
        community.members.push(user_id);
    }

    // Concurrent joins read-modify-write the same member list; last write
    // wins.
    sqlx::query("UPDATE communities SET members = ? WHERE id = ?")
        .bind(&community.members)
        .bind(community.id)
        .execute(&pool)
        .await?;

    update_joined_communities(&pool, user_id, &community.name, !is_member).await?;

    let view = load_community_view(&pool, community).await?;

    Ok(Json(json!({
        "message": if is_member { "Left community" } else { "Joined community" },
        "community": view,
    })))
}

/// Deletes a community. Creator only.
pub async fn delete_community(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let community = Community::fetch(&pool, id).await?;

    if community.creator_id != claims.user_id() {
        return Err(AppError::Forbidden("Not allowed".to_string()));
    }

    sqlx::query("DELETE FROM communities WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "message": "Community deleted" })))
}
