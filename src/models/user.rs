// src/models/user.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, SqlitePool, types::Json};
use validator::Validate;

use crate::error::AppError;

/// A user document from the 'users' collection.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Unique email address.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub bio: String,

    /// Names of the communities the user has joined.
    pub joined_communities: Json<Vec<String>>,

    /// Ids of users following this user.
    pub followers: Json<Vec<i64>>,

    /// Ids of users this user follows.
    pub following: Json<Vec<i64>>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    pub async fn fetch(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound("User not found".to_string()))
    }

    /// Batch username lookup for response population: collect the referenced
    /// ids, resolve them in one query, and splice usernames into the view.
    pub async fn username_map(
        pool: &SqlitePool,
        ids: &[i64],
    ) -> Result<HashMap<i64, String>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        // Dynamic IN clause; ids are deduplicated to keep the query small.
        let mut unique: Vec<i64> = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let mut query_builder =
            sqlx::QueryBuilder::<Sqlite>::new("SELECT id, username FROM users WHERE id IN (");
        let mut separated = query_builder.separated(",");
        for id in &unique {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows: Vec<(i64, String)> = query_builder.build_query_as().fetch_all(pool).await?;

        Ok(rows.into_iter().collect())
    }
}

/// A (id, username) pair used wherever a view references another user.
#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}

impl UserRef {
    pub fn resolve(id: i64, usernames: &HashMap<i64, String>) -> Self {
        UserRef {
            id,
            username: usernames.get(&id).cloned().unwrap_or_default(),
        }
    }
}

/// DTO for registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for login. Accepts either an email or a username.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email_or_username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBioRequest {
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: String,
}

/// DTO for profile updates. Both fields are optional; a password change
/// requires the current password.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,
    pub current_password: Option<String>,
    #[validate(length(min = 4, max = 128))]
    pub new_password: Option<String>,
}

/// Public profile view with follower/following usernames resolved.
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub id: i64,
    pub username: String,
    pub bio: String,
    pub joined_communities: Vec<String>,
    pub followers: Vec<UserRef>,
    pub following: Vec<UserRef>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
