use crate::models::User;
use crate::services::auth;
use crate::web::error::AppResult;
use crate::web::extractors::CurrentUser;
use crate::web::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct RegisterForm {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct SessionBody {
    token: String,
    user: User,
}

fn too_many_attempts() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "message": "Too many login attempts. Please try again later."
        })),
    )
        .into_response()
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(form): Json<RegisterForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let user = auth::register(&conn, &form.name, &form.email, &form.password)?;
    let token = auth::create_session(&conn, user.id, state.session_lifetime_days())?;
    Ok((StatusCode::CREATED, Json(SessionBody { token, user })).into_response())
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(form): Json<LoginForm>,
) -> AppResult<Response> {
    let key = form.email.trim().to_lowercase();
    if !state.rate_limiter.check(&key) {
        tracing::warn!("Login rate limit hit for {}", key);
        return Ok(too_many_attempts());
    }

    let conn = state.db.get()?;
    match auth::login(&conn, &key, &form.password, state.session_lifetime_days())? {
        Some(session) => {
            state.rate_limiter.clear(&key);
            Ok(Json(SessionBody {
                token: session.token,
                user: session.user,
            })
            .into_response())
        }
        None => {
            state.rate_limiter.record_attempt(&key);
            tracing::warn!("Failed login for {}", key);
            Ok((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "message": "Invalid email or password" })),
            )
                .into_response())
        }
    }
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    auth::delete_session(&conn, &session.token)?;
    Ok(Json(serde_json::json!({ "message": "Logged out" })).into_response())
}

/// GET /api/auth/me
pub async fn me(CurrentUser(session): CurrentUser) -> Json<User> {
    Json(session.user)
}
