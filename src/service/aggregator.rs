use derive_new::new;
use serde::Serialize;
use tracing::instrument;

use crate::database::{orm, Backend, Result};
use crate::model::*;

/// Maintains the deduplicated view counters and the first-view-ordered
/// `viewed_by` lists. Counter writes are single-statement atomic increments.
#[derive(Debug, Clone, new)]
pub struct Aggregator {
    backend: Backend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostViewStats {
    pub viewed_by_count: i64,
    pub viewed_by: Vec<UserId>,
    pub viewed_status: ViewedStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserViewStats {
    pub post_viewed_by_count: i64,
}

impl Aggregator {
    /// Fold a first view of `post` into the counters. Called exactly once per
    /// (viewer, post) pair by the view store.
    #[instrument(skip(self, post), fields(post_id = %post.post_id))]
    pub async fn record_first_view(&self, post: &Post) -> Result<()> {
        orm::posts::bump_viewed_by(&self.backend, &post.post_id).await?;
        orm::users::bump_post_viewed_by(&self.backend, &post.owner_id).await?;
        Ok(())
    }

    pub async fn post_view_stats(&self, post: &Post, viewer: &UserId) -> Result<PostViewStats> {
        // the owner's own record, when present, is dedup bookkeeping for the
        // trending path and is not a countable view
        let viewed_by: Vec<UserId> = orm::views::viewers(&self.backend, &post.post_id)
            .await?
            .into_iter()
            .filter(|id| *id != post.owner_id)
            .collect();
        let viewed_status = self.viewed_status(viewer, post).await?;

        // counter read goes back to the record so a stale `post` can't lie
        let viewed_by_count = orm::posts::get(&self.backend, &post.post_id)
            .await?
            .map_or(0, |post| post.viewed_by_count);

        Ok(PostViewStats {
            viewed_by_count,
            viewed_by,
            viewed_status,
        })
    }

    pub async fn user_view_stats(&self, user: &User) -> Result<UserViewStats> {
        Ok(UserViewStats {
            post_viewed_by_count: user.post_viewed_by_count,
        })
    }

    /// A post always reads as VIEWED to its owner.
    pub async fn viewed_status(&self, viewer: &UserId, post: &Post) -> Result<ViewedStatus> {
        if *viewer == post.owner_id {
            return Ok(ViewedStatus::Viewed);
        }

        let record = orm::views::get(&self.backend, viewer, &post.post_id).await?;
        Ok(match record {
            Some(_) => ViewedStatus::Viewed,
            None => ViewedStatus::NotViewed,
        })
    }
}
