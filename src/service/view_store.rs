use derive_new::new;
use itertools::Itertools;
use snafu::Snafu;
use tracing::instrument;

use crate::database::BackendError;
use crate::database::{orm, Backend};
use crate::model::*;
use crate::service::aggregator::Aggregator;
use crate::service::trending::TrendingIndex;

pub const MIN_BATCH: usize = 1;
pub const MAX_BATCH: usize = 100;

pub type Result<T, E = ViewError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ViewError {
    #[snafu(display("A minimum of {MIN_BATCH} post id must be reported, got {got}"))]
    BatchTooSmall { got: usize },

    #[snafu(display("A max of {MAX_BATCH} post ids may be reported at once, got {got}"))]
    BatchTooLarge { got: usize },

    #[snafu(display("User `{user_id}` is not ACTIVE"))]
    ViewerNotActive { user_id: UserId },

    #[snafu(display("{source}"))]
    Backend { source: BackendError },
}

impl From<BackendError> for ViewError {
    fn from(source: BackendError) -> Self {
        ViewError::Backend { source }
    }
}

/// Ingest path for reported views: batch validation, per-pair deduplication,
/// dual bookkeeping on duplicate posts, and trending credits.
#[derive(Debug, Clone, new)]
pub struct ViewStore {
    backend: Backend,
    aggregator: Aggregator,
    trending: TrendingIndex,
}

impl ViewStore {
    /// Record a batch of views reported by `viewer_id`.
    ///
    /// The batch either fully validates (size bounds, viewer ACTIVE) or fails
    /// before any item is processed; per-item conditions (missing post,
    /// non-COMPLETED post, own post, repeat view) are silent skips.
    #[instrument(skip(self, post_ids), fields(batch = post_ids.len()))]
    pub async fn record_views(&self, viewer_id: &UserId, post_ids: &[PostId]) -> Result<()> {
        if post_ids.len() < MIN_BATCH {
            return BatchTooSmallSnafu { got: post_ids.len() }.fail();
        }
        if post_ids.len() > MAX_BATCH {
            return BatchTooLargeSnafu { got: post_ids.len() }.fail();
        }

        let viewer = orm::users::get(&self.backend, viewer_id).await?;
        let active = viewer.map_or(false, |user| user.status == UserStatus::Active);
        if !active {
            return ViewerNotActiveSnafu {
                user_id: viewer_id.clone(),
            }
            .fail();
        }

        // repeats of the same id within one batch count once
        for post_id in post_ids.iter().unique() {
            self.record_one(viewer_id, post_id).await?;
        }

        Ok(())
    }

    async fn record_one(&self, viewer_id: &UserId, post_id: &PostId) -> Result<()> {
        let Some(post) = orm::posts::get(&self.backend, post_id).await? else {
            tracing::debug!("ignoring view of unknown post `{post_id}`");
            return Ok(());
        };

        if post.status != PostStatus::Completed {
            tracing::warn!(
                "user `{viewer_id}` reported view of post `{post_id}` with status {}, ignoring",
                post.status
            );
            return Ok(());
        }

        let original = if post.is_original() {
            None
        } else {
            orm::posts::get(&self.backend, &post.original_post_id).await?
        };
        let effective = original.as_ref().unwrap_or(&post);
        let owns_literal = post.owner_id == *viewer_id;
        let owns_original = effective.owner_id == *viewer_id;

        // Counter/record path: the literal post and the original each keep
        // their own per-viewer record. Owning the literal post makes the
        // whole item a no-op here; a duplicate's original leg is skipped
        // when the viewer owns it.
        let mut credit_trending = false;
        if !owns_literal {
            for target in std::iter::once(&post).chain(original.as_ref()) {
                if target.owner_id == *viewer_id {
                    continue;
                }

                let at = now();
                let record =
                    orm::views::upsert(&self.backend, viewer_id, &target.post_id, at).await?;
                if record.is_first_view() {
                    self.aggregator.record_first_view(target).await?;
                    if target.post_id == effective.post_id {
                        credit_trending = true;
                    }
                }
            }
        }

        // Trending path: a separate rule. Credit flows to the original post
        // and its owner. A viewer who owns the original credits it once; the
        // record written here is dedup-only and never reaches the counters
        // or viewed_by lists.
        if owns_original {
            let record =
                orm::views::upsert(&self.backend, viewer_id, &effective.post_id, now()).await?;
            credit_trending = record.is_first_view();
        }

        if credit_trending {
            self.trending.credit(effective, now()).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrendingConfig;
    use crate::testutil;

    fn store(backend: &Backend) -> (ViewStore, TrendingIndex) {
        let trending = TrendingIndex::new(backend.clone(), TrendingConfig::default());
        let aggregator = Aggregator::new(backend.clone());
        let store = ViewStore::new(backend.clone(), aggregator, trending.clone());
        (store, trending)
    }

    async fn viewed_by_count(backend: &Backend, post: &Post) -> i64 {
        orm::posts::get(backend, &post.post_id)
            .await
            .unwrap()
            .unwrap()
            .viewed_by_count
    }

    async fn post_viewed_by_count(backend: &Backend, user: &User) -> i64 {
        orm::users::get(backend, &user.user_id)
            .await
            .unwrap()
            .unwrap()
            .post_viewed_by_count
    }

    #[tokio::test]
    async fn first_view_counts_and_repeat_is_idempotent() {
        let backend = testutil::backend().await;
        let (store, _) = store(&backend);

        let owner = testutil::active_user(&backend).await;
        let viewer = testutil::active_user(&backend).await;
        let post = testutil::completed_post(&backend, &owner).await;

        store
            .record_views(&viewer.user_id, &[post.post_id.clone()])
            .await
            .unwrap();
        assert_eq!(viewed_by_count(&backend, &post).await, 1);
        assert_eq!(post_viewed_by_count(&backend, &owner).await, 1);

        store
            .record_views(&viewer.user_id, &[post.post_id.clone()])
            .await
            .unwrap();
        assert_eq!(viewed_by_count(&backend, &post).await, 1);
        assert_eq!(post_viewed_by_count(&backend, &owner).await, 1);
    }

    #[tokio::test]
    async fn repeats_within_one_batch_count_once() {
        let backend = testutil::backend().await;
        let (store, _) = store(&backend);

        let owner = testutil::active_user(&backend).await;
        let viewer = testutil::active_user(&backend).await;
        let post = testutil::completed_post(&backend, &owner).await;

        store
            .record_views(
                &viewer.user_id,
                &[post.post_id.clone(), post.post_id.clone()],
            )
            .await
            .unwrap();
        assert_eq!(viewed_by_count(&backend, &post).await, 1);
    }

    #[tokio::test]
    async fn batch_bounds_are_validated() {
        let backend = testutil::backend().await;
        let (store, _) = store(&backend);
        let viewer = testutil::active_user(&backend).await;

        let result = store.record_views(&viewer.user_id, &[]).await;
        assert!(matches!(result, Err(ViewError::BatchTooSmall { got: 0 })));

        let too_many: Vec<PostId> = (0..101).map(|_| PostId::random()).collect();
        let result = store.record_views(&viewer.user_id, &too_many).await;
        assert!(matches!(result, Err(ViewError::BatchTooLarge { got: 101 })));

        // exactly 100 unknown ids validates and no-ops
        let exactly: Vec<PostId> = (0..100).map(|_| PostId::random()).collect();
        store.record_views(&viewer.user_id, &exactly).await.unwrap();
    }

    #[tokio::test]
    async fn disabled_viewer_is_rejected() {
        let backend = testutil::backend().await;
        let (store, _) = store(&backend);

        let owner = testutil::active_user(&backend).await;
        let viewer = testutil::active_user(&backend).await;
        let post = testutil::completed_post(&backend, &owner).await;

        orm::users::set_status(&backend, &viewer.user_id, UserStatus::Disabled)
            .await
            .unwrap();

        let result = store.record_views(&viewer.user_id, &[post.post_id.clone()]).await;
        let error = result.unwrap_err();
        assert!(matches!(error, ViewError::ViewerNotActive { .. }));
        assert!(error.to_string().contains("is not ACTIVE"));
    }

    #[tokio::test]
    async fn non_completed_posts_are_silently_skipped() {
        let backend = testutil::backend().await;
        let (store, trending) = store(&backend);

        let owner = testutil::active_user(&backend).await;
        let viewer = testutil::active_user(&backend).await;

        let mut pending = Post::new(PostId::random(), owner.user_id.clone());
        pending.status = PostStatus::Pending;
        let pending = orm::posts::create(&backend, &pending).await.unwrap();

        let archived = testutil::completed_post(&backend, &owner).await;
        orm::posts::set_status(&backend, &archived.post_id, PostStatus::Archived)
            .await
            .unwrap();

        store
            .record_views(
                &viewer.user_id,
                &[pending.post_id.clone(), archived.post_id.clone()],
            )
            .await
            .unwrap();

        assert_eq!(viewed_by_count(&backend, &pending).await, 0);
        assert_eq!(viewed_by_count(&backend, &archived).await, 0);
        assert!(trending.trending_posts(now()).is_empty());
    }

    #[tokio::test]
    async fn own_post_views_stay_out_of_counters_but_do_trend() {
        let backend = testutil::backend().await;
        let (store, trending) = store(&backend);

        let owner = testutil::active_user(&backend).await;
        let post = testutil::completed_post(&backend, &owner).await;

        store
            .record_views(&owner.user_id, &[post.post_id.clone()])
            .await
            .unwrap();

        assert_eq!(viewed_by_count(&backend, &post).await, 0);
        assert_eq!(post_viewed_by_count(&backend, &owner).await, 0);

        let posts = trending.trending_posts(now());
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post_id, post.post_id);

        let users = trending.trending_users(now());
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, owner.user_id);
    }

    #[tokio::test]
    async fn repeat_self_views_credit_trending_once() {
        let backend = testutil::backend().await;
        let (store, trending) = store(&backend);

        let owner = testutil::active_user(&backend).await;
        let post = testutil::completed_post(&backend, &owner).await;

        store
            .record_views(&owner.user_id, &[post.post_id.clone()])
            .await
            .unwrap();
        store
            .record_views(&owner.user_id, &[post.post_id.clone()])
            .await
            .unwrap();

        // the dedup record absorbed the repeat: nothing queued, still one
        // entry, counters untouched
        assert_eq!(trending.pending_credits(), 0);
        assert_eq!(trending.trending_posts(now()).len(), 1);
        assert_eq!(viewed_by_count(&backend, &post).await, 0);
    }

    #[tokio::test]
    async fn duplicate_post_views_credit_both_records_but_only_original_trends() {
        let backend = testutil::backend().await;
        let (store, trending) = store(&backend);

        let original_owner = testutil::active_user(&backend).await;
        let duplicate_owner = testutil::active_user(&backend).await;
        let viewer = testutil::active_user(&backend).await;

        let original = testutil::completed_post(&backend, &original_owner).await;
        let duplicate = testutil::duplicate_post(&backend, &duplicate_owner, &original).await;

        store
            .record_views(&viewer.user_id, &[duplicate.post_id.clone()])
            .await
            .unwrap();

        // both posts and both owners got the view
        assert_eq!(viewed_by_count(&backend, &duplicate).await, 1);
        assert_eq!(viewed_by_count(&backend, &original).await, 1);
        assert_eq!(post_viewed_by_count(&backend, &duplicate_owner).await, 1);
        assert_eq!(post_viewed_by_count(&backend, &original_owner).await, 1);

        // but only the original is trending
        let posts = trending.trending_posts(now());
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post_id, original.post_id);

        let users = trending.trending_users(now());
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, original_owner.user_id);
    }

    #[tokio::test]
    async fn duplicate_owner_viewing_their_own_duplicate_is_skipped_entirely() {
        let backend = testutil::backend().await;
        let (store, trending) = store(&backend);

        let original_owner = testutil::active_user(&backend).await;
        let duplicate_owner = testutil::active_user(&backend).await;

        let original = testutil::completed_post(&backend, &original_owner).await;
        let duplicate = testutil::duplicate_post(&backend, &duplicate_owner, &original).await;

        store
            .record_views(&duplicate_owner.user_id, &[duplicate.post_id.clone()])
            .await
            .unwrap();

        // the view lands on neither post
        assert_eq!(viewed_by_count(&backend, &duplicate).await, 0);
        assert_eq!(viewed_by_count(&backend, &original).await, 0);
        assert_eq!(post_viewed_by_count(&backend, &original_owner).await, 0);
        assert!(orm::views::get(&backend, &duplicate_owner.user_id, &original.post_id)
            .await
            .unwrap()
            .is_none());

        // and they do not own the original, so nothing trends either
        assert!(trending.trending_posts(now()).is_empty());
        assert!(trending.trending_users(now()).is_empty());
    }

    #[tokio::test]
    async fn original_owner_viewing_the_duplicate_is_recorded_on_the_duplicate_only() {
        let backend = testutil::backend().await;
        let (store, _) = store(&backend);

        let original_owner = testutil::active_user(&backend).await;
        let duplicate_owner = testutil::active_user(&backend).await;

        let original = testutil::completed_post(&backend, &original_owner).await;
        let duplicate = testutil::duplicate_post(&backend, &duplicate_owner, &original).await;

        store
            .record_views(&original_owner.user_id, &[duplicate.post_id.clone()])
            .await
            .unwrap();

        assert_eq!(viewed_by_count(&backend, &duplicate).await, 1);
        assert_eq!(viewed_by_count(&backend, &original).await, 0);
    }
}
