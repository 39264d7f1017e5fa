//! Shared helpers for tests that need a live store: an in-process SurrealDB
//! engine plus fixture users and posts.

use url::Url;

use crate::database::{orm, Backend, DatabaseConfig};
use crate::model::*;

/// Fresh in-memory engine; every call gives an isolated database.
pub async fn backend() -> Backend {
    let config = DatabaseConfig {
        endpoint: Url::parse("mem://").expect("mem url"),
        namespace: "test".to_string(),
        database: "test".to_string(),
        credentials: None,
    };

    Backend::connect(&config).await.expect("connect to mem engine")
}

pub async fn active_user(db: &Backend) -> User {
    orm::users::create(db, &User::new(UserId::random()))
        .await
        .expect("create user")
}

/// COMPLETED, verified, original post owned by `owner`.
pub async fn completed_post(db: &Backend, owner: &User) -> Post {
    let mut post = Post::new(PostId::random(), owner.user_id.clone());
    post.is_verified = Some(true);
    orm::posts::create(db, &post).await.expect("create post")
}

/// COMPLETED, verified post whose views roll up to `original`.
pub async fn duplicate_post(db: &Backend, owner: &User, original: &Post) -> Post {
    let mut post = Post::new(PostId::random(), owner.user_id.clone());
    post.is_verified = Some(true);
    post.original_post_id = original.post_id.clone();
    orm::posts::create(db, &post).await.expect("create duplicate post")
}
