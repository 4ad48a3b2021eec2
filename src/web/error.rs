use crate::services::search::SearchError;
use crate::services::ContentError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

pub struct AppError(anyhow::Error);

impl AppError {
    pub fn unauthenticated() -> Self {
        Self(ContentError::Unauthenticated.into())
    }

    pub fn forbidden() -> Self {
        Self(ContentError::Forbidden.into())
    }

    pub fn not_found(what: &'static str) -> Self {
        Self(ContentError::NotFound(what).into())
    }

    pub fn status(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<ContentError>() {
            return match err {
                ContentError::Validation(_) => StatusCode::BAD_REQUEST,
                ContentError::NotFound(_) => StatusCode::NOT_FOUND,
                ContentError::Unauthenticated => StatusCode::UNAUTHORIZED,
                ContentError::Forbidden => StatusCode::FORBIDDEN,
                ContentError::Conflict(_) => StatusCode::CONFLICT,
            };
        }
        if let Some(err) = self.0.downcast_ref::<SearchError>() {
            return match err {
                SearchError::InvalidCategory(_) | SearchError::InvalidStatus(_) => {
                    StatusCode::BAD_REQUEST
                }
                SearchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        // Exhausted slug candidates and store failures alike.
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("Application error: {:?}", self.0);
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;
