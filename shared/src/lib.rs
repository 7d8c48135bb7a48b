use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Votes ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteDirection::Up => "up",
            VoteDirection::Down => "down",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(VoteDirection::Up),
            "down" => Some(VoteDirection::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVote {
    pub direction: VoteDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStatus {
    /// No signed-in user; nothing was written.
    Ignored,
    Committed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub outcome: VoteStatus,
    /// The post as it looks after the vote, when the batch committed.
    pub post: Option<Post>,
}

// ── Posts ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub book_title: String,
    pub book_author: String,
    pub user_name: String,
    pub user_photo: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
    pub up_votes: i64,
    pub down_votes: i64,
    pub interactions: i64,
    pub comment_count: i64,
    #[serde(default)]
    pub voters: BTreeMap<String, VoteDirection>,
}

impl Post {
    /// Cached tally for one direction.
    pub fn tally(&self, direction: VoteDirection) -> i64 {
        match direction {
            VoteDirection::Up => self.up_votes,
            VoteDirection::Down => self.down_votes,
        }
    }

    pub fn vote_of(&self, user_id: &str) -> Option<VoteDirection> {
        self.voters.get(user_id).copied()
    }

    /// Resume point for a page ending at this post.
    pub fn cursor(&self) -> FeedCursor {
        FeedCursor {
            created_at: self.created_at,
            id: self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub book_title: String,
    pub book_author: String,
    pub user_name: String,
    #[serde(default)]
    pub user_photo: Option<String>,
}

// ── Comments ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_name: String,
    pub body: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub user_name: String,
    pub body: String,
}

// ── Feed ──

/// Position of the last loaded post. Pages are ordered by
/// `(created_at desc, id desc)`, so both parts are needed to resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedCursor {
    pub created_at: i64,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedWindow {
    pub posts: Vec<Post>,
    pub cursor: Option<FeedCursor>,
    pub has_more: bool,
    pub loading: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author_level: u32,
    pub viewer_vote: Option<VoteDirection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedView {
    pub id: String,
    pub posts: Vec<PostView>,
    pub has_more: bool,
    pub loading: bool,
}

// ── Sharing ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharePlatform {
    Twitter,
    Facebook,
    Copy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLink {
    pub platform: SharePlatform,
    pub url: String,
}
