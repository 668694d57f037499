use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder `image_path` a post carries between record creation and a
/// successful image upload. A post visible in any listing must never still
/// hold it: one stuck in this state is a failed creation that should have
/// been rolled back.
pub const PENDING_IMAGE_PATH: &str = "pending_upload";

/// Blob container holding post images.
pub const POSTS_BUCKET: &str = "posts";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_path: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Whether the image upload for this post has not been reconciled yet.
    pub fn is_pending(&self) -> bool {
        self.image_path == PENDING_IMAGE_PATH
    }
}

/// Insert payload for `posts`. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub user_id: Uuid,
    pub image_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// One row of `user_info`: the display identity attached to an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub user_name: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub user_id: Uuid,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
}

/// A post as a feed renders it: the raw row plus author display data and
/// like aggregates attached at read time. Never persisted; the store only
/// ever holds the raw rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_path: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
    pub name: Option<String>,
    pub likes_count: u64,
    pub has_liked: bool,
}

impl FeedPost {
    pub fn from_parts(
        post: Post,
        author: Option<&Profile>,
        likes_count: u64,
        has_liked: bool,
    ) -> Self {
        Self {
            id: post.id,
            user_id: post.user_id,
            image_path: post.image_path,
            caption: post.caption,
            created_at: post.created_at,
            user_name: author.map(|a| a.user_name.clone()),
            name: author.and_then(|a| a.name.clone()),
            likes_count,
            has_liked,
        }
    }
}

/// A comment with author display data attached at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
    pub name: Option<String>,
}

impl CommentView {
    pub fn from_parts(comment: Comment, author: Option<&Profile>) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: comment.created_at,
            user_name: author.map(|a| a.user_name.clone()),
            name: author.and_then(|a| a.name.clone()),
        }
    }
}
