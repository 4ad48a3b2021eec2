use crate::services::posts::PostRules;
use crate::services::search::{Highlighter, SearchEngine};
use crate::services::slug::SlugResolver;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentConfig {
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    #[serde(default = "default_max_title_length")]
    pub max_title_length: usize,
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,
    #[serde(default = "default_max_excerpt_length")]
    pub max_excerpt_length: usize,
    /// Candidates tried before slug resolution gives up and reports a
    /// broken uniqueness index.
    #[serde(default = "default_slug_max_attempts")]
    pub slug_max_attempts: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            posts_per_page: default_posts_per_page(),
            max_page_size: default_max_page_size(),
            max_title_length: default_max_title_length(),
            min_content_length: default_min_content_length(),
            max_excerpt_length: default_max_excerpt_length(),
            slug_max_attempts: default_slug_max_attempts(),
        }
    }
}

impl ContentConfig {
    pub fn post_rules(&self) -> PostRules {
        PostRules::from(self)
    }

    pub fn slug_resolver(&self) -> SlugResolver {
        SlugResolver::new(self.slug_max_attempts)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_min_term_length")]
    pub min_term_length: usize,
    #[serde(default = "default_highlight_open")]
    pub highlight_open: String,
    #[serde(default = "default_highlight_close")]
    pub highlight_close: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_term_length: default_min_term_length(),
            highlight_open: default_highlight_open(),
            highlight_close: default_highlight_close(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_lifetime_days")]
    pub session_lifetime_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_lifetime_days: default_session_lifetime_days(),
        }
    }
}

fn default_language() -> String {
    "bn".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_pool_size() -> u32 {
    10
}

fn default_posts_per_page() -> usize {
    10
}

fn default_max_page_size() -> usize {
    100
}

fn default_max_title_length() -> usize {
    200
}

fn default_min_content_length() -> usize {
    100
}

fn default_max_excerpt_length() -> usize {
    300
}

fn default_slug_max_attempts() -> usize {
    crate::services::slug::DEFAULT_MAX_ATTEMPTS
}

fn default_min_term_length() -> usize {
    2
}

fn default_highlight_open() -> String {
    "<mark class=\"bg-yellow-200\">".to_string()
}

fn default_highlight_close() -> String {
    "</mark>".to_string()
}

fn default_session_lifetime_days() -> i64 {
    7
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Could not read config file '{}': {}. Run 'newsniche init' first?",
                path.display(),
                e
            )
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.site.url).is_err() {
            anyhow::bail!("site.url must be an absolute URL, got '{}'", self.site.url);
        }
        if self.content.posts_per_page == 0 {
            anyhow::bail!("content.posts_per_page must be greater than 0");
        }
        if self.content.posts_per_page > 100 {
            anyhow::bail!("content.posts_per_page must be 100 or less");
        }
        if self.content.max_page_size < self.content.posts_per_page {
            anyhow::bail!("content.max_page_size must be at least content.posts_per_page");
        }
        if self.content.slug_max_attempts == 0 {
            anyhow::bail!("content.slug_max_attempts must be greater than 0");
        }
        if self.search.min_term_length == 0 {
            anyhow::bail!("search.min_term_length must be greater than 0");
        }
        if self.auth.session_lifetime_days <= 0 {
            anyhow::bail!("auth.session_lifetime_days must be greater than 0");
        }
        Ok(())
    }

    pub fn site_url(&self) -> Result<url::Url> {
        Ok(url::Url::parse(&self.site.url)?)
    }

    pub fn search_engine(&self) -> SearchEngine {
        SearchEngine {
            min_term_length: self.search.min_term_length,
            default_page_size: self.content.posts_per_page,
            max_page_size: self.content.max_page_size,
            highlighter: Highlighter::new(
                self.search.highlight_open.clone(),
                self.search.highlight_close.clone(),
            ),
        }
    }
}
