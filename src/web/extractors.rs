use crate::models::Session;
use crate::services::auth;
use crate::web::error::AppError;
use crate::web::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

async fn session_from_parts(
    parts: &mut Parts,
    state: &Arc<AppState>,
) -> Result<Option<Session>, AppError> {
    let bearer = match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
    {
        Ok(TypedHeader(Authorization(bearer))) => bearer,
        Err(_) => return Ok(None),
    };
    let conn = state.db.get()?;
    Ok(auth::validate_session(&conn, bearer.token())?)
}

/// The signed-in caller. Rejects with 401 when the bearer token is missing,
/// unknown or expired.
pub struct CurrentUser(pub Session);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            session_from_parts(parts, state)
                .await?
                .map(CurrentUser)
                .ok_or_else(AppError::unauthenticated)
        })
    }
}

/// A signed-in admin or editor.
pub struct Author(pub Session);

impl FromRequestParts<Arc<AppState>> for Author {
    type Rejection = AppError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let CurrentUser(session) = CurrentUser::from_request_parts(parts, state).await?;
            if !session.user.role.can_author() {
                return Err(AppError::forbidden());
            }
            Ok(Author(session))
        })
    }
}

pub struct Admin(pub Session);

impl FromRequestParts<Arc<AppState>> for Admin {
    type Rejection = AppError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let CurrentUser(session) = CurrentUser::from_request_parts(parts, state).await?;
            if !session.is_admin() {
                return Err(AppError::forbidden());
            }
            Ok(Admin(session))
        })
    }
}
