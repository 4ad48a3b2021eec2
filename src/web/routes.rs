use super::handlers;
use super::state::AppState;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sitemap.xml", get(handlers::public::sitemap))
        .route("/robots.txt", get(handlers::public::robots))
        .route("/health", get(handlers::public::health))
}

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/posts",
            get(handlers::api::list_posts).post(handlers::api::create_post),
        )
        .route("/api/posts/search", get(handlers::api::search_posts))
        .route("/api/posts/slug/:slug", get(handlers::api::get_post_by_slug))
        .route(
            "/api/posts/:id",
            get(handlers::api::get_post)
                .patch(handlers::api::update_post)
                .delete(handlers::api::delete_post),
        )
        .route("/api/fix-slugs", post(handlers::api::fix_slugs))
        .route(
            "/api/categories",
            get(handlers::api::list_categories).post(handlers::api::create_category),
        )
        .route(
            "/api/categories/slug/:slug",
            get(handlers::api::get_category_by_slug),
        )
        .route(
            "/api/categories/:id",
            put(handlers::api::update_category).delete(handlers::api::delete_category),
        )
        .route("/api/tags", get(handlers::api::list_tags))
}

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::me))
}
