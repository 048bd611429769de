use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, types::Json};
use validator::Validate;

use crate::{
    error::AppError,
    models::{post::PostSummary, user::UserRef},
};

/// A community document from the 'communities' collection.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Community {
    pub id: i64,

    /// Unique community name.
    pub name: String,

    pub description: String,

    pub creator_id: i64,

    /// Ids of member users.
    pub members: Json<Vec<i64>>,

    /// Ids of posts created in this community.
    pub posts: Json<Vec<i64>>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Community {
    pub async fn fetch(pool: &SqlitePool, id: i64) -> Result<Community, AppError> {
        sqlx::query_as::<_, Community>("SELECT * FROM communities WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound("Community not found".to_string()))
    }

    /// Batch name lookup for response population, mirroring
    /// `User::username_map`.
    pub async fn name_map(
        pool: &SqlitePool,
        ids: &[i64],
    ) -> Result<std::collections::HashMap<i64, String>, AppError> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let mut unique: Vec<i64> = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let mut query_builder =
            sqlx::QueryBuilder::<sqlx::Sqlite>::new("SELECT id, name FROM communities WHERE id IN (");
        let mut separated = query_builder.separated(",");
        for id in &unique {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows: Vec<(i64, String)> = query_builder.build_query_as().fetch_all(pool).await?;

        Ok(rows.into_iter().collect())
    }
}

/// DTO for creating a community.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommunityRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Community name must be between 3 and 50 characters"
    ))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    #[serde(default)]
    pub description: String,
}

/// Populated community view: member usernames and post summaries resolved.
#[derive(Debug, Serialize)]
pub struct CommunityView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub creator: UserRef,
    pub members: Vec<UserRef>,
    pub posts: Vec<PostSummary>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
