use super::*;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Post {
    pub post_id: PostId,
    pub owner_id: UserId,
    pub status: PostStatus,
    /// Verdict of the external verification pipeline. `None` while pending.
    pub is_verified: Option<bool>,
    /// Points at the post itself unless the post is a content-duplicate of an
    /// earlier post, in which case it points at the canonical original.
    pub original_post_id: PostId,
    #[serde(default)]
    pub viewed_by_count: i64,
    pub created_at: Timestamp,
}

impl Post {
    pub fn new(post_id: PostId, owner_id: UserId) -> Self {
        let original_post_id = post_id.clone();

        Self {
            post_id,
            owner_id,
            status: PostStatus::Completed,
            is_verified: None,
            original_post_id,
            viewed_by_count: 0,
            created_at: now(),
        }
    }

    pub fn is_original(&self) -> bool {
        self.original_post_id == self.post_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Pending,
    Processing,
    Completed,
    Error,
    Archived,
    Deleting,
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PostStatus::Pending => "PENDING",
            PostStatus::Processing => "PROCESSING",
            PostStatus::Completed => "COMPLETED",
            PostStatus::Error => "ERROR",
            PostStatus::Archived => "ARCHIVED",
            PostStatus::Deleting => "DELETING",
        };
        write!(f, "{s}")
    }
}

/// Per-viewer view state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewedStatus {
    Viewed,
    NotViewed,
}
