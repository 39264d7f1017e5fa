use derive_new::new;
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use uuid::Uuid;

use super::*;

/// Identifier of a post. Stored as the canonical hyphenated UUID string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for PostId {
    type Err = ParsePostId;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(input)
            .map(|uuid| PostId(uuid.to_string()))
            .map_err(|_| ParsePostId::new(input.to_string()))
    }
}

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::convert::AsRef<str> for PostId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Snafu, new)]
#[snafu(display("Failed to parse post id: {}", text))]
pub struct ParsePostId {
    pub text: String,
}

/// Identifier of a user. Stored as the canonical hyphenated UUID string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for UserId {
    type Err = ParseUserId;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(input)
            .map(|uuid| UserId(uuid.to_string()))
            .map_err(|_| ParseUserId::new(input.to_string()))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::convert::AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Snafu, new)]
#[snafu(display("Failed to parse user id: {}", text))]
pub struct ParseUserId {
    pub text: String,
}

/// Record key for a (viewer, post) view record, also used for the
/// (blocker, blocked) and (follower, followed) relation tables. Keying the
/// record by the pair makes the create-or-increment write naturally unique.
pub fn pair_key(left: impl AsRef<str>, right: impl AsRef<str>) -> String {
    format!("{}:{}", left.as_ref(), right.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_id_round_trips_through_str() {
        let id = PostId::random();
        let parsed: PostId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn malformed_post_id_is_rejected() {
        let result = "not-a-uuid".parse::<PostId>();
        assert!(result.is_err());
    }

    #[test]
    fn uppercase_uuid_normalizes_to_lowercase() {
        let id: UserId = "A68F4B2D-6A9E-4D51-8E21-2C6B2E9C0001".parse().unwrap();
        assert_eq!(id.as_str(), "a68f4b2d-6a9e-4d51-8e21-2c6b2e9c0001");
    }

    #[test]
    fn pair_key_joins_with_colon() {
        let viewer: UserId = "a68f4b2d-6a9e-4d51-8e21-2c6b2e9c0001".parse().unwrap();
        let post: PostId = "0e8e4b2d-6a9e-4d51-8e21-2c6b2e9c0002".parse().unwrap();
        assert_eq!(
            pair_key(&viewer, &post),
            "a68f4b2d-6a9e-4d51-8e21-2c6b2e9c0001:0e8e4b2d-6a9e-4d51-8e21-2c6b2e9c0002"
        );
    }
}
