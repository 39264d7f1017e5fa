//! Record-level operations, one module per table. Free functions over a
//! [`Backend`] so services stay thin and the SQL stays in one place.

use snafu::{OptionExt, ResultExt};

use super::{
    Backend, DatabaseDeserializeSnafu, DatabaseQuerySnafu, EmptyQuerySnafu, Result,
};
use crate::model::*;

pub mod users {
    use super::*;

    pub async fn create(db: &Backend, user: &User) -> Result<User> {
        db.create(("users", user.user_id.as_str().to_string()))
            .content(user)
            .await
            .context(DatabaseQuerySnafu)?
            .context(EmptyQuerySnafu)
    }

    pub async fn get(db: &Backend, id: &UserId) -> Result<Option<User>> {
        db.select(("users", id.as_str().to_string()))
            .await
            .context(DatabaseQuerySnafu)
    }

    pub async fn set_status(db: &Backend, id: &UserId, status: UserStatus) -> Result<User> {
        db.update(("users", id.as_str().to_string()))
            .merge(serde_json::json!({ "status": status }))
            .await
            .context(DatabaseQuerySnafu)?
            .context(EmptyQuerySnafu)
    }

    pub async fn set_privacy(db: &Backend, id: &UserId, privacy: PrivacyStatus) -> Result<User> {
        db.update(("users", id.as_str().to_string()))
            .merge(serde_json::json!({ "privacy_status": privacy }))
            .await
            .context(DatabaseQuerySnafu)?
            .context(EmptyQuerySnafu)
    }

    /// Atomic `+= 1` on the user's received-views counter.
    pub async fn bump_post_viewed_by(db: &Backend, id: &UserId) -> Result<()> {
        db.query(
            "UPDATE type::thing('users', $id)
                SET post_viewed_by_count = (post_viewed_by_count ?? 0) + 1",
        )
        .bind(("id", id.as_str().to_string()))
        .await
        .context(DatabaseQuerySnafu)?
        .check()
        .context(DatabaseQuerySnafu)?;
        Ok(())
    }

    /// Atomic `-= 1`, used when a counted view record is backed out.
    pub async fn drop_post_viewed_by(db: &Backend, id: &UserId) -> Result<()> {
        db.query(
            "UPDATE type::thing('users', $id)
                SET post_viewed_by_count = (post_viewed_by_count ?? 0) - 1",
        )
        .bind(("id", id.as_str().to_string()))
        .await
        .context(DatabaseQuerySnafu)?
        .check()
        .context(DatabaseQuerySnafu)?;
        Ok(())
    }

    pub async fn reset_counters(db: &Backend, id: &UserId) -> Result<()> {
        db.query("UPDATE type::thing('users', $id) SET post_viewed_by_count = 0")
            .bind(("id", id.as_str().to_string()))
            .await
            .context(DatabaseQuerySnafu)?
            .check()
            .context(DatabaseQuerySnafu)?;
        Ok(())
    }
}

pub mod posts {
    use super::*;

    pub async fn create(db: &Backend, post: &Post) -> Result<Post> {
        db.create(("posts", post.post_id.as_str().to_string()))
            .content(post)
            .await
            .context(DatabaseQuerySnafu)?
            .context(EmptyQuerySnafu)
    }

    pub async fn get(db: &Backend, id: &PostId) -> Result<Option<Post>> {
        db.select(("posts", id.as_str().to_string()))
            .await
            .context(DatabaseQuerySnafu)
    }

    pub async fn set_status(db: &Backend, id: &PostId, status: PostStatus) -> Result<Post> {
        db.update(("posts", id.as_str().to_string()))
            .merge(serde_json::json!({ "status": status }))
            .await
            .context(DatabaseQuerySnafu)?
            .context(EmptyQuerySnafu)
    }

    /// Atomic `+= 1` on the post's distinct-viewer counter.
    pub async fn bump_viewed_by(db: &Backend, id: &PostId) -> Result<()> {
        db.query(
            "UPDATE type::thing('posts', $id)
                SET viewed_by_count = (viewed_by_count ?? 0) + 1",
        )
        .bind(("id", id.as_str().to_string()))
        .await
        .context(DatabaseQuerySnafu)?
        .check()
        .context(DatabaseQuerySnafu)?;
        Ok(())
    }

    /// Atomic `-= 1`, used when a counted view record is backed out.
    pub async fn drop_viewed_by(db: &Backend, id: &PostId) -> Result<()> {
        db.query(
            "UPDATE type::thing('posts', $id)
                SET viewed_by_count = (viewed_by_count ?? 0) - 1",
        )
        .bind(("id", id.as_str().to_string()))
        .await
        .context(DatabaseQuerySnafu)?
        .check()
        .context(DatabaseQuerySnafu)?;
        Ok(())
    }

    pub async fn by_owner(db: &Backend, owner: &UserId) -> Result<Vec<Post>> {
        let mut response = db
            .query("SELECT * FROM posts WHERE owner_id = $owner ORDER BY created_at ASC")
            .bind(("owner", owner.as_str().to_string()))
            .await
            .context(DatabaseQuerySnafu)?;

        response.take(0).context(DatabaseDeserializeSnafu)
    }

    pub async fn delete_by_owner(db: &Backend, owner: &UserId) -> Result<()> {
        db.query("DELETE posts WHERE owner_id = $owner")
            .bind(("owner", owner.as_str().to_string()))
            .await
            .context(DatabaseQuerySnafu)?
            .check()
            .context(DatabaseQuerySnafu)?;
        Ok(())
    }
}

pub mod views {
    use super::*;

    /// Create-or-increment in a single statement, keyed by the pair, so
    /// concurrent duplicate reports cannot double-count. `view_count == 1` on
    /// the returned record means this call created it.
    pub async fn upsert(
        db: &Backend,
        viewer: &UserId,
        post: &PostId,
        at: Timestamp,
    ) -> Result<ViewRecord> {
        let mut response = db
            .query(
                "UPDATE type::thing('views', $key) SET
                    post_id = $post_id,
                    viewer_id = $viewer_id,
                    view_count = (view_count ?? 0) + 1,
                    first_viewed_at = first_viewed_at ?? $now,
                    last_viewed_at = $now
                 RETURN AFTER",
            )
            .bind(("key", pair_key(viewer, post)))
            .bind(("post_id", post.as_str().to_string()))
            .bind(("viewer_id", viewer.as_str().to_string()))
            .bind(("now", at.to_rfc3339()))
            .await
            .context(DatabaseQuerySnafu)?;

        let record: Option<ViewRecord> = response.take(0).context(DatabaseDeserializeSnafu)?;
        record.context(EmptyQuerySnafu)
    }

    pub async fn get(db: &Backend, viewer: &UserId, post: &PostId) -> Result<Option<ViewRecord>> {
        db.select(("views", pair_key(viewer, post)))
            .await
            .context(DatabaseQuerySnafu)
    }

    /// Viewer ids in first-view order; simultaneous first views tie-break by
    /// viewer id so the list order is deterministic.
    pub async fn viewers(db: &Backend, post: &PostId) -> Result<Vec<UserId>> {
        #[derive(Debug, serde::Deserialize)]
        struct Row {
            viewer_id: UserId,
        }

        let mut response = db
            .query(
                "SELECT viewer_id, first_viewed_at FROM views
                 WHERE post_id = $post_id ORDER BY first_viewed_at ASC, viewer_id ASC",
            )
            .bind(("post_id", post.as_str().to_string()))
            .await
            .context(DatabaseQuerySnafu)?;

        let rows: Vec<Row> = response.take(0).context(DatabaseDeserializeSnafu)?;
        Ok(rows.into_iter().map(|row| row.viewer_id).collect())
    }

    /// Every record the viewer authored, across all posts.
    pub async fn by_viewer(db: &Backend, viewer: &UserId) -> Result<Vec<ViewRecord>> {
        let mut response = db
            .query("SELECT * FROM views WHERE viewer_id = $viewer")
            .bind(("viewer", viewer.as_str().to_string()))
            .await
            .context(DatabaseQuerySnafu)?;

        response.take(0).context(DatabaseDeserializeSnafu)
    }

    pub async fn delete_by_viewer(db: &Backend, viewer: &UserId) -> Result<()> {
        db.query("DELETE views WHERE viewer_id = $viewer")
            .bind(("viewer", viewer.as_str().to_string()))
            .await
            .context(DatabaseQuerySnafu)?
            .check()
            .context(DatabaseQuerySnafu)?;
        Ok(())
    }

    /// Drops every view record attached to posts owned by `owner`.
    pub async fn delete_by_post_owner(db: &Backend, owner: &UserId) -> Result<()> {
        db.query(
            "DELETE views WHERE post_id IN
                (SELECT VALUE post_id FROM posts WHERE owner_id = $owner)",
        )
        .bind(("owner", owner.as_str().to_string()))
        .await
        .context(DatabaseQuerySnafu)?
        .check()
        .context(DatabaseQuerySnafu)?;
        Ok(())
    }
}

pub mod blocks {
    use super::*;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct Block {
        pub blocker_id: UserId,
        pub blocked_id: UserId,
        pub created_at: Timestamp,
    }

    /// Idempotent: re-blocking an already blocked user is a no-op.
    pub async fn set(db: &Backend, blocker: &UserId, blocked: &UserId) -> Result<()> {
        let block = Block {
            blocker_id: blocker.clone(),
            blocked_id: blocked.clone(),
            created_at: now(),
        };

        let _: Option<Block> = db
            .update(("blocks", pair_key(blocker, blocked)))
            .content(&block)
            .await
            .context(DatabaseQuerySnafu)?;
        Ok(())
    }

    pub async fn exists(db: &Backend, blocker: &UserId, blocked: &UserId) -> Result<bool> {
        let block: Option<Block> = db
            .select(("blocks", pair_key(blocker, blocked)))
            .await
            .context(DatabaseQuerySnafu)?;
        Ok(block.is_some())
    }

    pub async fn delete_for_user(db: &Backend, user: &UserId) -> Result<()> {
        db.query("DELETE blocks WHERE blocker_id = $id OR blocked_id = $id")
            .bind(("id", user.as_str().to_string()))
            .await
            .context(DatabaseQuerySnafu)?
            .check()
            .context(DatabaseQuerySnafu)?;
        Ok(())
    }
}

pub mod follows {
    use super::*;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct Follow {
        pub follower_id: UserId,
        pub followed_id: UserId,
        pub created_at: Timestamp,
    }

    /// Idempotent: re-following is a no-op.
    pub async fn set(db: &Backend, follower: &UserId, followed: &UserId) -> Result<()> {
        let follow = Follow {
            follower_id: follower.clone(),
            followed_id: followed.clone(),
            created_at: now(),
        };

        let _: Option<Follow> = db
            .update(("follows", pair_key(follower, followed)))
            .content(&follow)
            .await
            .context(DatabaseQuerySnafu)?;
        Ok(())
    }

    pub async fn exists(db: &Backend, follower: &UserId, followed: &UserId) -> Result<bool> {
        let follow: Option<Follow> = db
            .select(("follows", pair_key(follower, followed)))
            .await
            .context(DatabaseQuerySnafu)?;
        Ok(follow.is_some())
    }

    pub async fn delete_for_user(db: &Backend, user: &UserId) -> Result<()> {
        db.query("DELETE follows WHERE follower_id = $id OR followed_id = $id")
            .bind(("id", user.as_str().to_string()))
            .await
            .context(DatabaseQuerySnafu)?
            .check()
            .context(DatabaseQuerySnafu)?;
        Ok(())
    }
}
