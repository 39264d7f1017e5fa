use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use snafu::Snafu;

use crate::database::BackendError;
use crate::service::directory::DirectoryError;
use crate::service::view_store::ViewError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("{message}"))]
    InvalidArgument { message: String },

    #[snafu(display("{message}"))]
    PermissionDenied { message: String },

    #[snafu(display("{message}"))]
    NotFound { message: String },

    #[snafu(display("{source}"))]
    Internal { source: BackendError },
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidArgument { .. } => "InvalidArgument",
            ApiError::PermissionDenied { .. } => "PermissionDenied",
            ApiError::NotFound { .. } => "NotFound",
            ApiError::Internal { .. } => "Internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            ApiError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal { source } = &self {
            tracing::error!("request failed: {source}");
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<ViewError> for ApiError {
    fn from(error: ViewError) -> Self {
        match error {
            ViewError::BatchTooSmall { .. } | ViewError::BatchTooLarge { .. } => {
                ApiError::InvalidArgument {
                    message: error.to_string(),
                }
            }
            ViewError::ViewerNotActive { .. } => ApiError::PermissionDenied {
                message: error.to_string(),
            },
            ViewError::Backend { source } => ApiError::Internal { source },
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(error: DirectoryError) -> Self {
        match error {
            DirectoryError::UserNotFound { .. } | DirectoryError::PostNotFound { .. } => {
                ApiError::NotFound {
                    message: error.to_string(),
                }
            }
            DirectoryError::Backend { source } => ApiError::Internal { source },
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(source: BackendError) -> Self {
        ApiError::Internal { source }
    }
}
