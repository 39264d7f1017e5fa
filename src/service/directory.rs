use derive_new::new;
use snafu::{OptionExt, Snafu};
use tracing::instrument;

use crate::database::{orm, Backend, BackendError};
use crate::model::*;
use crate::service::trending::TrendingIndex;

pub type Result<T, E = DirectoryError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DirectoryError {
    #[snafu(display("User `{user_id}` does not exist"))]
    UserNotFound { user_id: UserId },

    #[snafu(display("Post `{post_id}` does not exist"))]
    PostNotFound { post_id: PostId },

    #[snafu(display("{source}"))]
    Backend { source: BackendError },
}

impl From<BackendError> for DirectoryError {
    fn from(source: BackendError) -> Self {
        DirectoryError::Backend { source }
    }
}

/// Mutation surface for the user/post catalog the ranking reads from.
/// Lifecycle transitions cascade into the trending index.
#[derive(Debug, Clone, new)]
pub struct Directory {
    backend: Backend,
    trending: TrendingIndex,
}

impl Directory {
    pub async fn create_user(&self, user: User) -> Result<User> {
        Ok(orm::users::create(&self.backend, &user).await?)
    }

    pub async fn create_post(&self, post: Post) -> Result<Post> {
        Ok(orm::posts::create(&self.backend, &post).await?)
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<User> {
        orm::users::get(&self.backend, user_id)
            .await?
            .context(UserNotFoundSnafu {
                user_id: user_id.clone(),
            })
    }

    pub async fn get_post(&self, post_id: &PostId) -> Result<Post> {
        orm::posts::get(&self.backend, post_id)
            .await?
            .context(PostNotFoundSnafu {
                post_id: post_id.clone(),
            })
    }

    pub async fn set_user_status(&self, user_id: &UserId, status: UserStatus) -> Result<User> {
        self.get_user(user_id).await?;
        Ok(orm::users::set_status(&self.backend, user_id, status).await?)
    }

    pub async fn set_privacy_status(
        &self,
        user_id: &UserId,
        privacy: PrivacyStatus,
    ) -> Result<User> {
        self.get_user(user_id).await?;
        Ok(orm::users::set_privacy(&self.backend, user_id, privacy).await?)
    }

    /// Moving a post to ARCHIVED or DELETING drops it from the ranking.
    #[instrument(skip(self))]
    pub async fn set_post_status(&self, post_id: &PostId, status: PostStatus) -> Result<Post> {
        self.get_post(post_id).await?;
        let post = orm::posts::set_status(&self.backend, post_id, status).await?;

        if matches!(status, PostStatus::Archived | PostStatus::Deleting) {
            self.trending.remove_post(post_id);
        }

        Ok(post)
    }

    pub async fn block(&self, blocker: &UserId, blocked: &UserId) -> Result<()> {
        self.get_user(blocker).await?;
        self.get_user(blocked).await?;
        Ok(orm::blocks::set(&self.backend, blocker, blocked).await?)
    }

    pub async fn follow(&self, follower: &UserId, followed: &UserId) -> Result<()> {
        self.get_user(follower).await?;
        self.get_user(followed).await?;
        Ok(orm::follows::set(&self.backend, follower, followed).await?)
    }

    /// Wipe everything attributable to a user: their posts, view records on
    /// those posts, views they reported, relationships, counters, and every
    /// trending entry they back.
    #[instrument(skip(self))]
    pub async fn reset_user(&self, user_id: &UserId) -> Result<()> {
        self.get_user(user_id).await?;

        // back the user's views out of other people's counters before the
        // records disappear; records on their own posts were never counted
        for record in orm::views::by_viewer(&self.backend, user_id).await? {
            let Some(post) = orm::posts::get(&self.backend, &record.post_id).await? else {
                continue;
            };
            if post.owner_id == *user_id {
                continue;
            }
            orm::posts::drop_viewed_by(&self.backend, &post.post_id).await?;
            orm::users::drop_post_viewed_by(&self.backend, &post.owner_id).await?;
        }

        orm::views::delete_by_post_owner(&self.backend, user_id).await?;
        orm::views::delete_by_viewer(&self.backend, user_id).await?;
        orm::posts::delete_by_owner(&self.backend, user_id).await?;
        orm::blocks::delete_for_user(&self.backend, user_id).await?;
        orm::follows::delete_for_user(&self.backend, user_id).await?;
        orm::users::reset_counters(&self.backend, user_id).await?;
        self.trending.remove_user(user_id);

        tracing::info!("reset user `{user_id}`");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrendingConfig;
    use crate::service::aggregator::Aggregator;
    use crate::service::view_store::ViewStore;
    use crate::testutil;

    fn directory(backend: &Backend) -> (Directory, TrendingIndex, ViewStore) {
        let trending = TrendingIndex::new(backend.clone(), TrendingConfig::default());
        let directory = Directory::new(backend.clone(), trending.clone());
        let store = ViewStore::new(
            backend.clone(),
            Aggregator::new(backend.clone()),
            trending.clone(),
        );
        (directory, trending, store)
    }

    #[tokio::test]
    async fn missing_records_surface_not_found() {
        let backend = testutil::backend().await;
        let (directory, _, _) = directory(&backend);

        let result = directory.get_user(&UserId::random()).await;
        assert!(matches!(result, Err(DirectoryError::UserNotFound { .. })));

        let result = directory
            .set_post_status(&PostId::random(), PostStatus::Archived)
            .await;
        assert!(matches!(result, Err(DirectoryError::PostNotFound { .. })));
    }

    #[tokio::test]
    async fn archiving_drops_the_trending_entry() {
        let backend = testutil::backend().await;
        let (directory, trending, store) = directory(&backend);

        let owner = testutil::active_user(&backend).await;
        let post = testutil::completed_post(&backend, &owner).await;
        let viewer = testutil::active_user(&backend).await;

        store
            .record_views(&viewer.user_id, &[post.post_id.clone()])
            .await
            .unwrap();
        assert_eq!(trending.trending_posts(now()).len(), 1);

        directory
            .set_post_status(&post.post_id, PostStatus::Archived)
            .await
            .unwrap();
        assert!(trending.trending_posts(now()).is_empty());
    }

    #[tokio::test]
    async fn reset_user_backs_their_views_out_of_other_counters() {
        let backend = testutil::backend().await;
        let (directory, _, store) = directory(&backend);

        let owner = testutil::active_user(&backend).await;
        let post = testutil::completed_post(&backend, &owner).await;
        let viewer = testutil::active_user(&backend).await;

        store
            .record_views(&viewer.user_id, &[post.post_id.clone()])
            .await
            .unwrap();
        let counted = orm::posts::get(&backend, &post.post_id).await.unwrap().unwrap();
        assert_eq!(counted.viewed_by_count, 1);

        directory.reset_user(&viewer.user_id).await.unwrap();

        // the surviving post's count matches its now-empty viewed_by list
        let post = orm::posts::get(&backend, &post.post_id).await.unwrap().unwrap();
        assert_eq!(post.viewed_by_count, 0);
        assert!(orm::views::viewers(&backend, &post.post_id).await.unwrap().is_empty());

        let owner = orm::users::get(&backend, &owner.user_id).await.unwrap().unwrap();
        assert_eq!(owner.post_viewed_by_count, 0);
    }

    #[tokio::test]
    async fn reset_user_erases_their_entire_footprint() {
        let backend = testutil::backend().await;
        let (directory, trending, store) = directory(&backend);

        let owner = testutil::active_user(&backend).await;
        let post = testutil::completed_post(&backend, &owner).await;
        let viewer = testutil::active_user(&backend).await;
        let viewer_post = testutil::completed_post(&backend, &viewer).await;

        store
            .record_views(&viewer.user_id, &[post.post_id.clone()])
            .await
            .unwrap();
        store
            .record_views(&owner.user_id, &[viewer_post.post_id.clone()])
            .await
            .unwrap();

        directory.reset_user(&owner.user_id).await.unwrap();

        // posts and their view records are gone
        assert!(orm::posts::get(&backend, &post.post_id).await.unwrap().is_none());
        assert!(orm::views::get(&backend, &viewer.user_id, &post.post_id)
            .await
            .unwrap()
            .is_none());
        // views the reset user reported elsewhere are gone too, so the same
        // view counts again
        assert!(orm::views::get(&backend, &owner.user_id, &viewer_post.post_id)
            .await
            .unwrap()
            .is_none());
        // counters zeroed, trending entries dropped
        let user = orm::users::get(&backend, &owner.user_id).await.unwrap().unwrap();
        assert_eq!(user.post_viewed_by_count, 0);
        assert!(trending
            .trending_users(now())
            .iter()
            .all(|entry| entry.user_id != owner.user_id));
        assert!(trending
            .trending_posts(now())
            .iter()
            .all(|entry| entry.post_id != post.post_id));
    }
}
