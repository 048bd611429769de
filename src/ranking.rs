//! Read-time ranking heuristics.
//!
//! Stateless formulas over (score, age, vote totals, comment count),
//! recomputed on every request. Nothing here is persisted or maintained
//! incrementally; given equal inputs the order is always the same.

use chrono::{DateTime, Utc};

use crate::models::post::{CommentView, PostSummary};

/// Net vote score.
pub fn score(upvotes: usize, downvotes: usize) -> i64 {
    upvotes as i64 - downvotes as i64
}

/// Hotness: signed log-magnitude of the score plus an age term.
pub fn hot(score: i64, age_hours: f64) -> f64 {
    let magnitude = (score.abs().max(1) as f64).log10();
    score.signum() as f64 * magnitude + age_hours / 12.0
}

/// Top: score plus discussion size. Ties are broken by score alone.
pub fn top(score: i64, comment_count: i64) -> i64 {
    score + comment_count
}

/// Controversy: vote balance weighted by vote volume. A 50/50 split on many
/// votes scores highest; no votes scores zero.
pub fn controversial(upvotes: usize, downvotes: usize) -> f64 {
    let total = (upvotes + downvotes) as f64;
    if total == 0.0 {
        return 0.0;
    }
    let balance = upvotes.min(downvotes) as f64 / total;
    balance * total
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    New,
    Hot,
    Top,
    Controversial,
}

impl SortOrder {
    /// Parses the `sort` query parameter; unknown values fall back to `New`.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("hot") => SortOrder::Hot,
            Some("top") => SortOrder::Top,
            Some("controversial") => SortOrder::Controversial,
            _ => SortOrder::New,
        }
    }
}

fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - created_at).num_seconds() as f64 / 3600.0
}

/// Orders a post listing in place. `now` is passed in so the result is a pure
/// function of its inputs.
pub fn sort_posts(posts: &mut [PostSummary], order: SortOrder, now: DateTime<Utc>) {
    match order {
        SortOrder::New => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::Hot => posts.sort_by(|a, b| {
            let ha = hot(a.score, age_hours(a.created_at, now));
            let hb = hot(b.score, age_hours(b.created_at, now));
            hb.total_cmp(&ha)
        }),
        SortOrder::Top => posts.sort_by(|a, b| {
            (top(b.score, b.comment_count), b.score).cmp(&(top(a.score, a.comment_count), a.score))
        }),
        SortOrder::Controversial => posts.sort_by(|a, b| {
            let ca = controversial(a.upvote_count, a.downvote_count);
            let cb = controversial(b.upvote_count, b.downvote_count);
            cb.total_cmp(&ca)
        }),
    }
}

/// Orders the top-level comments of a post view in place. Replies keep their
/// insertion order under their parent.
pub fn sort_comments(comments: &mut [CommentView], order: SortOrder, now: DateTime<Utc>) {
    match order {
        // Insertion order is oldest-first already; "new" keeps it.
        SortOrder::New => {}
        SortOrder::Hot => comments.sort_by(|a, b| {
            let ha = hot(a.score, age_hours(a.created_at, now));
            let hb = hot(b.score, age_hours(b.created_at, now));
            hb.total_cmp(&ha)
        }),
        SortOrder::Top => comments.sort_by(|a, b| {
            (top(b.score, b.replies.len() as i64), b.score)
                .cmp(&(top(a.score, a.replies.len() as i64), a.score))
        }),
        SortOrder::Controversial => comments.sort_by(|a, b| {
            let ca = controversial(a.upvotes.len(), a.downvotes.len());
            let cb = controversial(b.upvotes.len(), b.downvotes.len());
            cb.total_cmp(&ca)
        }),
    }
}
