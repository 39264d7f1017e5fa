mod error;
mod state;

pub use error::*;
pub use state::{create_app, App};

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::model::UserId;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

pub const VIEWER_HEADER: &str = "x-viewer-id";

/// Caller identity. Authentication happens upstream; this surface trusts the
/// `x-viewer-id` header.
#[derive(Debug, Clone)]
pub struct Viewer(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let header = parts
            .headers
            .get(VIEWER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::InvalidArgument {
                message: format!("the `{VIEWER_HEADER}` header is required"),
            })?;

        let user_id = header
            .parse::<UserId>()
            .map_err(|error| ApiError::InvalidArgument {
                message: error.to_string(),
            })?;

        Ok(Viewer(user_id))
    }
}

pub fn create_router(app: App) -> Router {
    Router::new()
        .route("/v1/views", post(views::report))
        .route("/v1/posts/:post_id/views", get(views::post_stats))
        .route("/v1/users/:user_id/views", get(views::user_stats))
        .route("/v1/trending/posts", get(trending::posts))
        .route("/v1/trending/users", get(trending::users))
        .route("/v1/users", post(directory::create_user))
        .route("/v1/posts", post(directory::create_post))
        .route("/v1/posts/:post_id/status", put(directory::set_post_status))
        .route("/v1/users/:user_id/status", put(directory::set_user_status))
        .route("/v1/users/:user_id/privacy", put(directory::set_privacy))
        .route("/v1/users/:user_id/block", post(directory::block))
        .route("/v1/users/:user_id/follow", post(directory::follow))
        .route("/v1/users/:user_id/reset", post(directory::reset_user))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app)
}

mod views {
    use axum::extract::{Path, State};
    use axum::Json;
    use serde::Deserialize;
    use tracing::instrument;

    use super::{App, Result, Viewer};
    use crate::model::{PostId, UserId};
    use crate::service::aggregator::{PostViewStats, UserViewStats};

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReportViews {
        pub post_ids: Vec<PostId>,
    }

    #[instrument(skip(app, payload))]
    pub async fn report(
        State(app): State<App>,
        Viewer(viewer): Viewer,
        Json(payload): Json<ReportViews>,
    ) -> Result<Json<serde_json::Value>> {
        app.views.record_views(&viewer, &payload.post_ids).await?;
        Ok(Json(serde_json::json!({ "recorded": true })))
    }

    #[instrument(skip(app))]
    pub async fn post_stats(
        State(app): State<App>,
        Viewer(viewer): Viewer,
        Path(post_id): Path<PostId>,
    ) -> Result<Json<PostViewStats>> {
        let post = app.directory.get_post(&post_id).await?;
        let stats = app.aggregator.post_view_stats(&post, &viewer).await?;
        Ok(Json(stats))
    }

    #[instrument(skip(app))]
    pub async fn user_stats(
        State(app): State<App>,
        Path(user_id): Path<UserId>,
    ) -> Result<Json<UserViewStats>> {
        let user = app.directory.get_user(&user_id).await?;
        let stats = app.aggregator.user_view_stats(&user).await?;
        Ok(Json(stats))
    }
}

mod trending {
    use axum::extract::{Query, State};
    use axum::Json;
    use serde::Deserialize;
    use tracing::instrument;

    use super::{App, Result, Viewer};
    use crate::model::ViewedStatus;
    use crate::service::visibility::{VisiblePost, VisibleUser};

    #[derive(Debug, Default, Deserialize)]
    pub struct TrendingPostsQuery {
        pub viewed_status: Option<ViewedStatus>,
    }

    #[instrument(skip(app))]
    pub async fn posts(
        State(app): State<App>,
        Viewer(viewer): Viewer,
        Query(query): Query<TrendingPostsQuery>,
    ) -> Result<Json<Vec<VisiblePost>>> {
        let posts = app
            .query
            .list_trending_posts(&viewer, query.viewed_status)
            .await?;
        Ok(Json(posts))
    }

    #[instrument(skip(app))]
    pub async fn users(
        State(app): State<App>,
        Viewer(viewer): Viewer,
    ) -> Result<Json<Vec<VisibleUser>>> {
        let users = app.query.list_trending_users(&viewer).await?;
        Ok(Json(users))
    }
}

mod directory {
    use axum::extract::{Path, State};
    use axum::Json;
    use serde::Deserialize;
    use tracing::instrument;

    use super::{App, Result, Viewer};
    use crate::model::{Post, PostId, PostStatus, PrivacyStatus, User, UserId, UserStatus};

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateUser {
        pub user_id: Option<UserId>,
        pub privacy_status: Option<PrivacyStatus>,
    }

    #[instrument(skip(app, payload))]
    pub async fn create_user(
        State(app): State<App>,
        Json(payload): Json<CreateUser>,
    ) -> Result<Json<User>> {
        let mut user = User::new(payload.user_id.unwrap_or_else(UserId::random));
        if let Some(privacy) = payload.privacy_status {
            user.privacy_status = privacy;
        }
        Ok(Json(app.directory.create_user(user).await?))
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreatePost {
        pub post_id: Option<PostId>,
        pub owner_id: UserId,
        pub status: Option<PostStatus>,
        pub is_verified: Option<bool>,
        pub original_post_id: Option<PostId>,
    }

    #[instrument(skip(app, payload))]
    pub async fn create_post(
        State(app): State<App>,
        Json(payload): Json<CreatePost>,
    ) -> Result<Json<Post>> {
        app.directory.get_user(&payload.owner_id).await?;

        let mut post = Post::new(
            payload.post_id.unwrap_or_else(PostId::random),
            payload.owner_id,
        );
        if let Some(status) = payload.status {
            post.status = status;
        }
        post.is_verified = payload.is_verified;
        if let Some(original) = payload.original_post_id {
            post.original_post_id = original;
        }
        Ok(Json(app.directory.create_post(post).await?))
    }

    #[derive(Debug, Deserialize)]
    pub struct SetPostStatus {
        pub status: PostStatus,
    }

    #[instrument(skip(app))]
    pub async fn set_post_status(
        State(app): State<App>,
        Path(post_id): Path<PostId>,
        Json(payload): Json<SetPostStatus>,
    ) -> Result<Json<Post>> {
        Ok(Json(
            app.directory.set_post_status(&post_id, payload.status).await?,
        ))
    }

    #[derive(Debug, Deserialize)]
    pub struct SetUserStatus {
        pub status: UserStatus,
    }

    #[instrument(skip(app))]
    pub async fn set_user_status(
        State(app): State<App>,
        Path(user_id): Path<UserId>,
        Json(payload): Json<SetUserStatus>,
    ) -> Result<Json<User>> {
        Ok(Json(
            app.directory.set_user_status(&user_id, payload.status).await?,
        ))
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SetPrivacy {
        pub privacy_status: PrivacyStatus,
    }

    #[instrument(skip(app))]
    pub async fn set_privacy(
        State(app): State<App>,
        Path(user_id): Path<UserId>,
        Json(payload): Json<SetPrivacy>,
    ) -> Result<Json<User>> {
        Ok(Json(
            app.directory
                .set_privacy_status(&user_id, payload.privacy_status)
                .await?,
        ))
    }

    /// The caller (`x-viewer-id`) blocks the subject in the path.
    #[instrument(skip(app))]
    pub async fn block(
        State(app): State<App>,
        Viewer(viewer): Viewer,
        Path(user_id): Path<UserId>,
    ) -> Result<Json<serde_json::Value>> {
        app.directory.block(&viewer, &user_id).await?;
        Ok(Json(serde_json::json!({ "blocked": true })))
    }

    /// The caller (`x-viewer-id`) follows the subject in the path.
    #[instrument(skip(app))]
    pub async fn follow(
        State(app): State<App>,
        Viewer(viewer): Viewer,
        Path(user_id): Path<UserId>,
    ) -> Result<Json<serde_json::Value>> {
        app.directory.follow(&viewer, &user_id).await?;
        Ok(Json(serde_json::json!({ "followed": true })))
    }

    #[instrument(skip(app))]
    pub async fn reset_user(
        State(app): State<App>,
        Path(user_id): Path<UserId>,
    ) -> Result<Json<serde_json::Value>> {
        app.directory.reset_user(&user_id).await?;
        Ok(Json(serde_json::json!({ "reset": true })))
    }
}
