use super::*;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct User {
    pub user_id: UserId,
    #[new(value = "UserStatus::Active")]
    pub status: UserStatus,
    #[new(value = "PrivacyStatus::Public")]
    pub privacy_status: PrivacyStatus,
    /// Total first views received across all of this user's posts.
    #[new(default)]
    #[serde(default)]
    pub post_viewed_by_count: i64,
    #[new(value = "now()")]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Disabled,
    Deleting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrivacyStatus {
    Public,
    Private,
}

/// Whether the subject user blocks the requesting viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockerStatus {
    #[serde(rename = "SELF")]
    Self_,
    Blocking,
    NotBlocking,
}

/// Whether the requesting viewer follows the subject user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowedStatus {
    #[serde(rename = "SELF")]
    Self_,
    Following,
    NotFollowing,
}
