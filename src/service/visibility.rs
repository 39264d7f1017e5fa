use std::collections::HashMap;

use derive_new::new;
use serde::Serialize;

use crate::database::{orm, Backend, BackendError};
use crate::model::*;
use crate::service::trending::{RankedPost, RankedUser};

pub type Result<T, E = BackendError> = std::result::Result<T, E>;

/// How a ranked subject relates to the viewer asking for the list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub user_id: UserId,
    pub blocker_status: BlockerStatus,
    pub privacy_status: PrivacyStatus,
    pub followed_status: FollowedStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisiblePost {
    pub post_id: PostId,
    pub score: f64,
    pub viewed_status: ViewedStatus,
    pub posted_by: Relationship,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleUser {
    pub score: f64,
    #[serde(flatten)]
    pub relationship: Relationship,
}

/// Per-viewer read-side filter over ranked results. Never mutates the index.
#[derive(Debug, Clone, new)]
pub struct VisibilityFilter {
    backend: Backend,
}

impl VisibilityFilter {
    pub async fn relationship(&self, viewer: &UserId, subject: &User) -> Result<Relationship> {
        if subject.user_id == *viewer {
            return Ok(Relationship {
                user_id: subject.user_id.clone(),
                blocker_status: BlockerStatus::Self_,
                privacy_status: subject.privacy_status,
                followed_status: FollowedStatus::Self_,
            });
        }

        let blocking = orm::blocks::exists(&self.backend, &subject.user_id, viewer).await?;
        let following = orm::follows::exists(&self.backend, viewer, &subject.user_id).await?;

        Ok(Relationship {
            user_id: subject.user_id.clone(),
            blocker_status: if blocking {
                BlockerStatus::Blocking
            } else {
                BlockerStatus::NotBlocking
            },
            privacy_status: subject.privacy_status,
            followed_status: if following {
                FollowedStatus::Following
            } else {
                FollowedStatus::NotFollowing
            },
        })
    }

    /// Drop ranked posts the viewer may not see and enrich the rest.
    pub async fn filter_posts(
        &self,
        viewer: &UserId,
        ranked: Vec<RankedPost>,
    ) -> Result<Vec<VisiblePost>> {
        let mut owners: HashMap<UserId, Option<Relationship>> = HashMap::new();
        let mut visible = Vec::with_capacity(ranked.len());

        for post in ranked {
            let relationship = match owners.get(&post.owner_id) {
                Some(cached) => cached.clone(),
                None => {
                    let computed = self.owner_relationship(viewer, &post.owner_id).await?;
                    owners.insert(post.owner_id.clone(), computed.clone());
                    computed
                }
            };
            let Some(relationship) = relationship else {
                continue;
            };

            let viewed_status = if post.owner_id == *viewer {
                ViewedStatus::Viewed
            } else if orm::views::get(&self.backend, viewer, &post.post_id)
                .await?
                .is_some()
            {
                ViewedStatus::Viewed
            } else {
                ViewedStatus::NotViewed
            };

            visible.push(VisiblePost {
                post_id: post.post_id,
                score: post.score,
                viewed_status,
                posted_by: relationship,
            });
        }

        Ok(visible)
    }

    /// Drop ranked users who block the viewer and enrich the rest.
    pub async fn filter_users(
        &self,
        viewer: &UserId,
        ranked: Vec<RankedUser>,
    ) -> Result<Vec<VisibleUser>> {
        let mut visible = Vec::with_capacity(ranked.len());

        for user in ranked {
            let Some(subject) = orm::users::get(&self.backend, &user.user_id).await? else {
                continue;
            };
            let relationship = self.relationship(viewer, &subject).await?;
            if relationship.blocker_status == BlockerStatus::Blocking {
                continue;
            }
            visible.push(VisibleUser {
                score: user.score,
                relationship,
            });
        }

        Ok(visible)
    }

    /// None when the owner is gone, blocks the viewer, or is private and
    /// unfollowed.
    async fn owner_relationship(
        &self,
        viewer: &UserId,
        owner: &UserId,
    ) -> Result<Option<Relationship>> {
        let Some(subject) = orm::users::get(&self.backend, owner).await? else {
            return Ok(None);
        };
        let relationship = self.relationship(viewer, &subject).await?;

        if relationship.blocker_status == BlockerStatus::Blocking {
            return Ok(None);
        }
        let private = relationship.privacy_status == PrivacyStatus::Private;
        let followed = matches!(
            relationship.followed_status,
            FollowedStatus::Following | FollowedStatus::Self_
        );
        if private && !followed {
            return Ok(None);
        }

        Ok(Some(relationship))
    }
}
