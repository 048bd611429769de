use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, types::Json};
use uuid::Uuid;
use validator::Validate;

use crate::{error::AppError, models::user::UserRef, ranking};

/// Placeholder text a soft-deleted comment keeps in place of its body.
pub const DELETED_TEXT: &str = "[deleted]";

/// A post document from the 'posts' collection.
///
/// Comments and replies are embedded sub-documents stored in the `comments`
/// JSON column; they never get rows of their own. Mutations read the whole
/// document, edit it in memory and write the changed columns back, so
/// concurrent writers to the same post are last-write-wins.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,

    /// Optional image; may be an http(s) URL or a base64 data URL.
    pub image_url: Option<String>,

    pub community_id: i64,
    pub creator_id: i64,

    pub upvotes: Json<Vec<i64>>,
    pub downvotes: Json<Vec<i64>>,

    pub comments: Json<Vec<Comment>>,

    /// Cached summary, kept until a forced refresh.
    pub ai_summary: Option<Json<AiSummary>>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A top-level comment embedded in a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub author: i64,
    pub text: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub upvotes: Vec<i64>,
    #[serde(default)]
    pub downvotes: Vec<i64>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

/// A reply under a top-level comment. Replies carry no `replies` list of
/// their own; the single nesting level is a property of the type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub id: Uuid,
    pub author: i64,
    pub text: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub upvotes: Vec<i64>,
    #[serde(default)]
    pub downvotes: Vec<i64>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSummary {
    pub text: String,
    /// "gemini" or "local".
    pub source: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Toggle semantics shared by posts, comments and replies: the caller's id is
/// cleared from both lists, then pushed onto the side matching the requested
/// direction (1 up, -1 down, anything else just removes the vote). Repeating
/// the same vote is therefore idempotent, and an id can never sit in both
/// lists at once.
pub fn apply_vote(upvotes: &mut Vec<i64>, downvotes: &mut Vec<i64>, user_id: i64, vote: i32) {
    upvotes.retain(|&id| id != user_id);
    downvotes.retain(|&id| id != user_id);

    match vote {
        1 => upvotes.push(user_id),
        -1 => downvotes.push(user_id),
        _ => {}
    }
}

impl Comment {
    pub fn new(author: i64, text: String) -> Self {
        Comment {
            id: Uuid::new_v4(),
            author,
            text,
            created_at: chrono::Utc::now(),
            upvotes: Vec::new(),
            downvotes: Vec::new(),
            is_deleted: false,
            replies: Vec::new(),
        }
    }

    /// Soft delete: the node keeps its id, position and replies; only the
    /// text and the flag change.
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.text = DELETED_TEXT.to_string();
    }

    pub fn reply_mut(&mut self, id: Uuid) -> Option<&mut Reply> {
        self.replies.iter_mut().find(|r| r.id == id)
    }
}

impl Reply {
    pub fn new(author: i64, text: String) -> Self {
        Reply {
            id: Uuid::new_v4(),
            author,
            text,
            created_at: chrono::Utc::now(),
            upvotes: Vec::new(),
            downvotes: Vec::new(),
            is_deleted: false,
        }
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.text = DELETED_TEXT.to_string();
    }
}

impl Post {
    pub async fn fetch(pool: &SqlitePool, id: i64) -> Result<Post, AppError> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound("Post not found".to_string()))
    }

    /// Write the mutable document columns back. Last write wins; concurrent
    /// votes or comments on the same post can drop each other.
    pub async fn save(&self, pool: &SqlitePool) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE posts SET title = ?, content = ?, upvotes = ?, downvotes = ?, comments = ?, ai_summary = ? WHERE id = ?",
        )
        .bind(&self.title)
        .bind(&self.content)
        .bind(&self.upvotes)
        .bind(&self.downvotes)
        .bind(&self.comments)
        .bind(&self.ai_summary)
        .bind(self.id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub fn score(&self) -> i64 {
        ranking::score(self.upvotes.len(), self.downvotes.len())
    }

    /// Total discussion size: top-level comments plus replies.
    pub fn comment_count(&self) -> i64 {
        self.comments
            .iter()
            .map(|c| 1 + c.replies.len() as i64)
            .sum()
    }

    pub fn comment_mut(&mut self, id: Uuid) -> Option<&mut Comment> {
        self.comments.0.iter_mut().find(|c| c.id == id)
    }

    /// Every user id a populated view of this post needs a username for.
    pub fn referenced_user_ids(&self) -> Vec<i64> {
        let mut ids = vec![self.creator_id];
        for comment in self.comments.iter() {
            ids.push(comment.author);
            ids.extend(comment.replies.iter().map(|r| r.author));
        }
        ids
    }
}

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 300,
        message = "Title length must be between 1 and 300 chars"
    ))]
    pub title: String,

    #[validate(length(max = 40000, message = "Content must be at most 40000 chars"))]
    #[serde(default)]
    pub content: String,

    pub community_id: i64,

    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(max = 300))]
    pub title: Option<String>,
    #[validate(length(max = 40000))]
    pub content: Option<String>,
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    pub community_id: Option<i64>,
    pub creator_id: Option<i64>,
    /// Sort order: 'new' (default), 'hot', 'top' or 'controversial'.
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    /// 1 for upvote, -1 for downvote, 0 removes the vote.
    pub vote: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(max = 10000, message = "Comment must be at most 10000 characters"))]
    pub text: String,

    /// When set, the new comment becomes a reply under this top-level comment.
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CommentVoteRequest {
    pub vote: i32,
    /// Set when the target is a reply under this top-level comment.
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteCommentRequest {
    /// Set when the target is a reply under this top-level comment.
    pub parent_comment_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Populated views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CommunityRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyView {
    pub id: Uuid,
    pub author: UserRef,
    pub text: String,
    pub upvotes: Vec<i64>,
    pub downvotes: Vec<i64>,
    pub score: i64,
    pub is_deleted: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub author: UserRef,
    pub text: String,
    pub upvotes: Vec<i64>,
    pub downvotes: Vec<i64>,
    pub score: i64,
    pub is_deleted: bool,
    pub replies: Vec<ReplyView>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Fully populated post, as returned by the detail endpoint and after
/// mutations (clients re-render from this without a second fetch).
#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub community: CommunityRef,
    pub creator: UserRef,
    pub upvotes: Vec<i64>,
    pub downvotes: Vec<i64>,
    pub score: i64,
    pub comment_count: i64,
    pub comments: Vec<CommentView>,
    pub ai_summary: Option<AiSummary>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// List-item view: ranking inputs without the comment bodies.
#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub community: CommunityRef,
    pub creator: UserRef,
    pub upvote_count: usize,
    pub downvote_count: usize,
    pub score: i64,
    pub comment_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ReplyView {
    pub fn build(reply: &Reply, usernames: &HashMap<i64, String>) -> Self {
        ReplyView {
            id: reply.id,
            author: UserRef::resolve(reply.author, usernames),
            text: reply.text.clone(),
            score: ranking::score(reply.upvotes.len(), reply.downvotes.len()),
            upvotes: reply.upvotes.clone(),
            downvotes: reply.downvotes.clone(),
            is_deleted: reply.is_deleted,
            created_at: reply.created_at,
        }
    }
}

impl CommentView {
    pub fn build(comment: &Comment, usernames: &HashMap<i64, String>) -> Self {
        CommentView {
            id: comment.id,
            author: UserRef::resolve(comment.author, usernames),
            text: comment.text.clone(),
            score: ranking::score(comment.upvotes.len(), comment.downvotes.len()),
            upvotes: comment.upvotes.clone(),
            downvotes: comment.downvotes.clone(),
            is_deleted: comment.is_deleted,
            replies: comment
                .replies
                .iter()
                .map(|r| ReplyView::build(r, usernames))
                .collect(),
            created_at: comment.created_at,
        }
    }
}

impl PostView {
    pub fn build(post: &Post, community: CommunityRef, usernames: &HashMap<i64, String>) -> Self {
        PostView {
            id: post.id,
            title: post.title.clone(),
            content: post.content.clone(),
            image_url: post.image_url.clone(),
            community,
            creator: UserRef::resolve(post.creator_id, usernames),
            score: post.score(),
            comment_count: post.comment_count(),
            upvotes: post.upvotes.0.clone(),
            downvotes: post.downvotes.0.clone(),
            comments: post
                .comments
                .iter()
                .map(|c| CommentView::build(c, usernames))
                .collect(),
            ai_summary: post.ai_summary.as_ref().map(|s| s.0.clone()),
            created_at: post.created_at,
        }
    }
}

impl PostSummary {
    pub fn build(post: &Post, community: CommunityRef, usernames: &HashMap<i64, String>) -> Self {
        PostSummary {
            id: post.id,
            title: post.title.clone(),
            content: post.content.clone(),
            image_url: post.image_url.clone(),
            community,
            creator: UserRef::resolve(post.creator_id, usernames),
            upvote_count: post.upvotes.len(),
            downvote_count: post.downvotes.len(),
            score: post.score(),
            comment_count: post.comment_count(),
            created_at: post.created_at,
        }
    }
}
