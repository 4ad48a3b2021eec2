use crate::services::posts::PostRules;
use crate::services::search::SearchEngine;
use crate::services::slug::SlugResolver;
use crate::web::security::RateLimiter;
use crate::{Config, Database};
use anyhow::Result;
use std::sync::Arc;
use url::Url;

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub site_url: Url,
    pub search: SearchEngine,
    pub slugs: SlugResolver,
    pub post_rules: PostRules,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let site_url = config.site_url()?;
        let search = config.search_engine();
        let slugs = config.content.slug_resolver();
        let post_rules = config.content.post_rules();

        Ok(Self {
            config,
            db,
            site_url,
            search,
            slugs,
            post_rules,
            rate_limiter: Arc::new(RateLimiter::default()),
        })
    }

    pub fn session_lifetime_days(&self) -> i64 {
        self.config.auth.session_lifetime_days
    }
}
