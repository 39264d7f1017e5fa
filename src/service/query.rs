use derive_new::new;

use crate::database::BackendError;
use crate::model::*;
use crate::service::trending::TrendingIndex;
use crate::service::visibility::{VisibilityFilter, VisiblePost, VisibleUser};

pub type Result<T, E = BackendError> = std::result::Result<T, E>;

/// Read side of the trending surface: ranked snapshot, then the per-viewer
/// visibility pass. Side-effect free.
#[derive(Debug, Clone, new)]
pub struct TrendingQuery {
    trending: TrendingIndex,
    visibility: VisibilityFilter,
}

impl TrendingQuery {
    pub async fn list_trending_posts(
        &self,
        viewer: &UserId,
        viewed_status: Option<ViewedStatus>,
    ) -> Result<Vec<VisiblePost>> {
        let ranked = self.trending.trending_posts(now());
        let mut visible = self.visibility.filter_posts(viewer, ranked).await?;
        if let Some(wanted) = viewed_status {
            visible.retain(|post| post.viewed_status == wanted);
        }
        Ok(visible)
    }

    pub async fn list_trending_users(&self, viewer: &UserId) -> Result<Vec<VisibleUser>> {
        let ranked = self.trending.trending_users(now());
        self.visibility.filter_users(viewer, ranked).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrendingConfig;
    use crate::database::{orm, Backend};
    use crate::service::aggregator::Aggregator;
    use crate::service::view_store::ViewStore;
    use crate::testutil;

    struct Fixture {
        backend: Backend,
        store: ViewStore,
        trending: TrendingIndex,
        query: TrendingQuery,
    }

    async fn fixture() -> Fixture {
        let backend = testutil::backend().await;
        let trending = TrendingIndex::new(backend.clone(), TrendingConfig::default());
        let store = ViewStore::new(
            backend.clone(),
            Aggregator::new(backend.clone()),
            trending.clone(),
        );
        let query = TrendingQuery::new(trending.clone(), VisibilityFilter::new(backend.clone()));
        Fixture {
            backend,
            store,
            trending,
            query,
        }
    }

    #[tokio::test]
    async fn ranks_by_view_volume() {
        let fx = fixture().await;

        let owner = testutil::active_user(&fx.backend).await;
        let quiet = testutil::completed_post(&fx.backend, &owner).await;
        let busy = testutil::completed_post(&fx.backend, &owner).await;

        for _ in 0..3 {
            let viewer = testutil::active_user(&fx.backend).await;
            fx.store
                .record_views(&viewer.user_id, &[busy.post_id.clone()])
                .await
                .unwrap();
        }
        let viewer = testutil::active_user(&fx.backend).await;
        fx.store
            .record_views(
                &viewer.user_id,
                &[quiet.post_id.clone(), busy.post_id.clone()],
            )
            .await
            .unwrap();
        fx.trending.converge(now()).await.unwrap();

        let posts = fx
            .query
            .list_trending_posts(&viewer.user_id, None)
            .await
            .unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].post_id, busy.post_id);
        assert_eq!(posts[1].post_id, quiet.post_id);
        assert!(posts[0].score > posts[1].score);
    }

    #[tokio::test]
    async fn viewed_status_filter_partitions_results() {
        let fx = fixture().await;

        let owner = testutil::active_user(&fx.backend).await;
        let seen = testutil::completed_post(&fx.backend, &owner).await;
        let unseen = testutil::completed_post(&fx.backend, &owner).await;

        let other = testutil::active_user(&fx.backend).await;
        fx.store
            .record_views(&other.user_id, &[unseen.post_id.clone()])
            .await
            .unwrap();

        let viewer = testutil::active_user(&fx.backend).await;
        fx.store
            .record_views(&viewer.user_id, &[seen.post_id.clone()])
            .await
            .unwrap();

        let viewed = fx
            .query
            .list_trending_posts(&viewer.user_id, Some(ViewedStatus::Viewed))
            .await
            .unwrap();
        assert_eq!(viewed.len(), 1);
        assert_eq!(viewed[0].post_id, seen.post_id);

        let not_viewed = fx
            .query
            .list_trending_posts(&viewer.user_id, Some(ViewedStatus::NotViewed))
            .await
            .unwrap();
        assert_eq!(not_viewed.len(), 1);
        assert_eq!(not_viewed[0].post_id, unseen.post_id);
    }

    #[tokio::test]
    async fn archived_posts_leave_the_ranking() {
        let fx = fixture().await;

        let owner = testutil::active_user(&fx.backend).await;
        let post = testutil::completed_post(&fx.backend, &owner).await;
        let viewer = testutil::active_user(&fx.backend).await;

        fx.store
            .record_views(&viewer.user_id, &[post.post_id.clone()])
            .await
            .unwrap();
        assert_eq!(
            fx.query
                .list_trending_posts(&viewer.user_id, None)
                .await
                .unwrap()
                .len(),
            1
        );

        orm::posts::set_status(&fx.backend, &post.post_id, PostStatus::Archived)
            .await
            .unwrap();
        fx.trending.remove_post(&post.post_id);

        assert!(fx
            .query
            .list_trending_posts(&viewer.user_id, None)
            .await
            .unwrap()
            .is_empty());
        // the owner's user entry survives the post removal
        assert_eq!(
            fx.query
                .list_trending_users(&viewer.user_id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn blocked_viewer_sees_neither_posts_nor_owner() {
        let fx = fixture().await;

        let owner = testutil::active_user(&fx.backend).await;
        let post = testutil::completed_post(&fx.backend, &owner).await;
        let viewer = testutil::active_user(&fx.backend).await;

        fx.store
            .record_views(&viewer.user_id, &[post.post_id.clone()])
            .await
            .unwrap();
        orm::blocks::set(&fx.backend, &owner.user_id, &viewer.user_id)
            .await
            .unwrap();

        assert!(fx
            .query
            .list_trending_posts(&viewer.user_id, None)
            .await
            .unwrap()
            .is_empty());
        assert!(fx
            .query
            .list_trending_users(&viewer.user_id)
            .await
            .unwrap()
            .is_empty());

        // an unblocked third party still sees both
        let other = testutil::active_user(&fx.backend).await;
        assert_eq!(
            fx.query
                .list_trending_posts(&other.user_id, None)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            fx.query
                .list_trending_users(&other.user_id)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
