use crate::models::{CreateCategory, CreatePost, Language, UpdateCategory, UpdatePost};
use crate::services::posts::{self, parse_id, ListQuery};
use crate::services::search::SearchRequest;
use crate::services::{categories, tags, ContentError};
use crate::web::error::{AppError, AppResult};
use crate::web::extractors::{Admin, Author, CurrentUser};
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use std::sync::Arc;

/// Page numbers arrive as text; anything unparseable counts as absent.
fn number(raw: &Option<String>) -> Option<i64> {
    raw.as_deref().and_then(|v| v.trim().parse().ok())
}

#[derive(Deserialize)]
pub struct PostListParams {
    page: Option<String>,
    limit: Option<String>,
    category: Option<String>,
    tag: Option<String>,
    search: Option<String>,
    status: Option<String>,
}

/// GET /api/posts
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PostListParams>,
) -> AppResult<Response> {
    let query = ListQuery {
        page: number(&params.page),
        limit: number(&params.limit),
        category: params.category,
        tag: params.tag,
        search: params.search,
        status: params.status,
    };
    let conn = state.db.get()?;
    let list = posts::list_posts(
        &*conn,
        &query,
        state.config.content.posts_per_page,
        state.config.content.max_page_size,
    )?;
    Ok(Json(list).into_response())
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Author(session): Author,
    Json(input): Json<CreatePost>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = posts::create_post(&conn, input, session.user.id, &state.post_rules)?;
    Ok((StatusCode::CREATED, Json(post)).into_response())
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id, "post")?;
    let conn = state.db.get()?;
    let post = posts::get_post(&conn, id)?.ok_or(AppError::not_found("Post not found"))?;
    Ok(Json(post).into_response())
}

/// PATCH /api/posts/:id
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    Json(patch): Json<UpdatePost>,
) -> AppResult<Response> {
    let id = parse_id(&id, "post")?;
    let conn = state.db.get()?;
    let post = posts::update_post(&conn, id, patch, &session, &state.post_rules)?;
    Ok(Json(post).into_response())
}

/// DELETE /api/posts/:id
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id, "post")?;
    let conn = state.db.get()?;
    posts::delete_post(&conn, id, &session)?;
    Ok(Json(serde_json::json!({ "message": "Post deleted successfully" })).into_response())
}

/// GET /api/posts/slug/:slug
pub async fn get_post_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post =
        posts::get_post_by_slug(&conn, &slug)?.ok_or(AppError::not_found("Post not found"))?;
    Ok(Json(post).into_response())
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
    page: Option<String>,
    limit: Option<String>,
    category: Option<String>,
    status: Option<String>,
}

/// GET /api/posts/search
pub async fn search_posts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> AppResult<Response> {
    let request = SearchRequest {
        term: params.q,
        page: number(&params.page),
        page_size: number(&params.limit),
        category: params.category,
        status: params.status,
    };
    let conn = state.db.get()?;
    let page = state.search.search(&*conn, &request)?;
    Ok(Json(page).into_response())
}

/// POST /api/fix-slugs
pub async fn fix_slugs(
    State(state): State<Arc<AppState>>,
    Admin(_session): Admin,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let repairs = posts::fix_slugs(&conn, &state.post_rules)?;
    Ok(Json(serde_json::json!({
        "message": format!("Fixed {} post slug(s)", repairs.len()),
        "fixed": repairs,
    }))
    .into_response())
}

#[derive(Deserialize)]
pub struct CategoryParams {
    language: Option<String>,
}

/// GET /api/categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CategoryParams>,
) -> AppResult<Response> {
    let language = match params.language.as_deref().filter(|l| !l.is_empty()) {
        Some(raw) => Some(
            raw.parse::<Language>()
                .map_err(|_| ContentError::Validation(format!("Invalid language '{}'", raw)))?,
        ),
        None => None,
    };
    let conn = state.db.get()?;
    let categories = categories::list_categories(&conn, language)?;
    Ok(Json(categories).into_response())
}

/// POST /api/categories
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Author(_session): Author,
    Json(input): Json<CreateCategory>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let category = categories::create_category(&conn, input, &state.slugs)?;
    Ok((StatusCode::CREATED, Json(category)).into_response())
}

/// PUT /api/categories/:id
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Author(_session): Author,
    Path(id): Path<String>,
    Json(patch): Json<UpdateCategory>,
) -> AppResult<Response> {
    let id = parse_id(&id, "category")?;
    let conn = state.db.get()?;
    let category = categories::update_category(&conn, id, patch, &state.slugs)?;
    Ok(Json(category).into_response())
}

/// DELETE /api/categories/:id
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Author(_session): Author,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id, "category")?;
    let conn = state.db.get()?;
    categories::delete_category(&conn, id)?;
    Ok(Json(serde_json::json!({ "message": "Category deleted successfully" })).into_response())
}

/// GET /api/categories/slug/:slug
pub async fn get_category_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let category = categories::get_category_by_slug(&conn, &slug)?
        .ok_or(AppError::not_found("Category not found"))?;
    Ok(Json(category).into_response())
}

#[derive(Deserialize)]
pub struct TagParams {
    q: Option<String>,
}

const TAG_SUGGESTION_LIMIT: usize = 10;

/// GET /api/tags
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TagParams>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    match params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(fragment) => {
            let suggestions = tags::suggest_tags(&conn, fragment, TAG_SUGGESTION_LIMIT)?;
            Ok(Json(suggestions).into_response())
        }
        None => Ok(Json(tags::list_tags_with_counts(&conn)?).into_response()),
    }
}
