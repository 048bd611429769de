// src/handlers/auth.rs

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
    config::{Config, SEARCH_USER_LIMIT},
    error::AppError,
    models::user::{
        LoginRequest, ProfileView, RegisterRequest, UpdateBioRequest, UpdateProfileRequest, User,
        UserRef,
    },
    utils::{
        hash::{hash_password, verify_password},
        html::clean_html,
        jwt::{Claims, sign_jwt},
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created with a signed token and the user (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // 1. Check if username or email already exists
    let existing =
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ? OR email = ?")
            .bind(&payload.username)
            .bind(&payload.email)
            .fetch_optional(&pool)
            .await?;

    if existing.is_some() {
        return Err(AppError::BadRequest(
            "Username or email already taken".to_string(),
        ));
    }

    let hashed_password = hash_password(&payload.password)?;

    // 2. Insert User. The UNIQUE constraints back up the check above, which
    // can race with a concurrent registration.
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO users (username, email, password, bio, joined_communities, followers, following, created_at)
        VALUES (?, ?, ?, '', '[]', '[]', '[]', ?)
        RETURNING id
        "#,
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&hashed_password)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint") {
            AppError::BadRequest("Username or email already taken".to_string())
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    let user = User::fetch(&pool, id).await?;
    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "token": token, "user": user })),
    ))
}

/// Authenticates a user and returns a JWT token.
///
/// The identifier may be an email address or a username.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? OR username = ?")
        .bind(&payload.email_or_username)
        .bind(&payload.email_or_username)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Login DB error: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or(AppError::BadRequest("User not found".to_string()))?;

    let is_valid = verify_password(&payload.password, &user.password)?;

    if !is_valid {
        return Err(AppError::BadRequest("Wrong password".to_string()));
    }

    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({ "token": token, "user": user })))
}

/// Returns the currently authenticated user.
pub async fn me(
    State(pool): State<SqlitePool>,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    let user = User::fetch(&pool, claims.user_id()).await?;

    Ok(Json(json!({ "user": user })))
}

/// Replaces the current user's bio.
pub async fn update_bio(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Json(payload): Json<UpdateBioRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut user = User::fetch(&pool, claims.user_id()).await?;
    user.bio = clean_html(&payload.bio);

    sqlx::query("UPDATE users SET bio = ? WHERE id = ?")
        .bind(&user.bio)
        .bind(user.id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "user": user })))
}

/// Updates username and/or password.
///
/// A password change requires the correct current password.
pub async fn update_profile(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut user = User::fetch(&pool, claims.user_id()).await?;

    // 1. Update username if provided and changed
    if let Some(username) = payload.username.as_deref().map(str::trim) {
        if !username.is_empty() && username != user.username {
            let taken =
                sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ? AND id != ?")
                    .bind(username)
                    .bind(user.id)
                    .fetch_optional(&pool)
                    .await?;

            if taken.is_some() {
                return Err(AppError::BadRequest("Username is already taken".to_string()));
            }

            user.username = username.to_string();
        }
    }

    // 2. Update password if requested
    if let Some(new_password) = &payload.new_password {
        let current = payload.current_password.as_deref().ok_or(AppError::BadRequest(
            "Current password is required to change password".to_string(),
        ))?;

        if !verify_password(current, &user.password)? {
            return Err(AppError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        user.password = hash_password(new_password)?;
    }

    sqlx::query("UPDATE users SET username = ?, password = ? WHERE id = ?")
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "user": user })))
}

/// Toggles following another user, maintaining both id lists.
pub async fn follow_user(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let current_id = claims.user_id();

    if current_id == user_id {
        return Err(AppError::BadRequest("Cannot follow yourself".to_string()));
    }

    let mut current_user = User::fetch(&pool, current_id).await?;
    let mut target_user = User::fetch(&pool, user_id).await?;

    let is_following = current_user.following.contains(&user_id);

    if is_following {
        // Unfollow
        current_user.following.retain(|&id| id != user_id);
        target_user.followers.retain(|&id| id != current_id);
    } else {
        // Follow
        if !current_user.following.contains(&user_id) {
            current_user.following.push(user_id);
        }
        if !target_user.followers.contains(&current_id) {
            target_user.followers.push(current_id);
        }
    }

    // Two independent document writes; a concurrent follow/unfollow on either
    // side is last-write-wins.
    sqlx::query("UPDATE users SET following = ? WHERE id = ?")
        .bind(&current_user.following)
        .bind(current_user.id)
        .execute(&pool)
        .await?;

    sqlx::query("UPDATE users SET followers = ? WHERE id = ?")
        .bind(&target_user.followers)
        .bind(target_user.id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({
        "message": if is_following { "Unfollowed user" } else { "Followed user" },
        "following": current_user.following,
        "followers": current_user.followers,
    })))
}

/// Public profile of any user, with follower/following usernames resolved.
pub async fn get_user(
    State(pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = User::fetch(&pool, user_id).await?;

    let mut ids: Vec<i64> = Vec::new();
    ids.extend(user.followers.iter());
    ids.extend(user.following.iter());
    let usernames = User::username_map(&pool, &ids).await?;

    let profile = ProfileView {
        id: user.id,
        username: user.username,
        bio: user.bio,
        joined_communities: user.joined_communities.0,
        followers: user
            .followers
            .iter()
            .map(|&id| UserRef::resolve(id, &usernames))
            .collect(),
        following: user
            .following
            .iter()
            .map(|&id| UserRef::resolve(id, &usernames))
            .collect(),
        created_at: user.created_at,
    };

    Ok(Json(json!({ "user": profile })))
}

#[derive(Debug, Deserialize)]
pub struct UserSearchParams {
    pub q: Option<String>,
}

/// Case-insensitive username search.
pub async fn search_users(
    State(pool): State<SqlitePool>,
    Query(params): Query<UserSearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let term = params.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Ok(Json(json!({ "users": [] })));
    }

    let pattern = RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&pool)
        .await?;

    let matches: Vec<User> = users
        .into_iter()
        .filter(|u| pattern.is_match(&u.username))
        .take(SEARCH_USER_LIMIT)
        .collect();

    Ok(Json(json!({ "users": matches })))
}
