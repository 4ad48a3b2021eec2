use crate::services::sitemap;
use crate::web::error::AppResult;
use crate::web::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

pub async fn sitemap(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    let conn = state.db.get()?;
    let xml = sitemap::generate_sitemap(&conn, &state.site_url)?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/xml"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        xml,
    )
        .into_response())
}

pub async fn robots(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    let body = sitemap::generate_robots(&state.site_url)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}

pub async fn health(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    let conn = state.db.get()?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "site": state.config.site.title,
    }))
    .into_response())
}
