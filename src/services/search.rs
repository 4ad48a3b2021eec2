//! Free-text post search with pagination and match highlighting.

use crate::models::{PostSummary, StatusFilter};
use crate::services::posts::{PostFilter, PostSort, PostStore};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub const MIN_TERM_LENGTH: usize = 2;
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Invalid category ID")]
    InvalidCategory(String),
    #[error("Invalid status '{0}'")]
    InvalidStatus(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Raw search request as received from a client. Nothing here is trusted.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub term: String,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub category: Option<String>,
    pub status: Option<String>,
}

/// Page number and page size, both at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

impl Pagination {
    /// Missing or non-positive values fall back to the defaults; the page size
    /// is capped at `max_size`.
    pub fn normalize(
        page: Option<i64>,
        per_page: Option<i64>,
        default_size: usize,
        max_size: usize,
    ) -> Self {
        let page = page.filter(|p| *p > 0).map(|p| p as usize).unwrap_or(1);
        let per_page = per_page
            .filter(|s| *s > 0)
            .map(|s| s as usize)
            .unwrap_or(default_size)
            .min(max_size)
            .max(1);
        Self { page, per_page }
    }

    /// Rows to skip, or `None` when the window starts past what a SQL
    /// OFFSET can address.
    pub fn offset(&self) -> Option<usize> {
        let page = i64::try_from(self.page - 1).ok()?;
        let per_page = i64::try_from(self.per_page).ok()?;
        usize::try_from(page.checked_mul(per_page)?).ok()
    }

    /// Offset of a page that lies within `total` results. Pages past the end
    /// are not worth a fetch.
    pub fn window(&self, total: u64) -> Option<usize> {
        if self.page as u64 > self.total_pages(total) {
            return None;
        }
        self.offset()
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.per_page as u64)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub posts: Vec<PostSummary>,
    pub total: u64,
    pub page: usize,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SearchPage {
    fn empty(page: usize, query: &str, message: Option<String>) -> Self {
        Self {
            posts: Vec::new(),
            total: 0,
            page,
            total_pages: 0,
            has_next_page: false,
            has_prev_page: false,
            query: query.to_string(),
            message,
        }
    }
}

/// Wraps every case-insensitive occurrence of a term in a pair of markers.
#[derive(Debug, Clone)]
pub struct Highlighter {
    open: String,
    close: String,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new("<mark class=\"bg-yellow-200\">", "</mark>")
    }
}

impl Highlighter {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Compile `term` as a literal, case-insensitive pattern.
    fn pattern(term: &str) -> Option<Regex> {
        if term.is_empty() {
            return None;
        }
        RegexBuilder::new(&escape_term(term))
            .case_insensitive(true)
            .build()
            .ok()
    }

    pub fn highlight(&self, text: &str, term: &str) -> String {
        match Self::pattern(term) {
            Some(re) => self.apply(&re, text),
            None => text.to_string(),
        }
    }

    fn apply(&self, re: &Regex, text: &str) -> String {
        re.replace_all(text, |caps: &regex::Captures| {
            format!("{}{}{}", self.open, &caps[0], self.close)
        })
        .into_owned()
    }
}

/// Escape regex metacharacters so `term` matches only itself.
pub fn escape_term(term: &str) -> String {
    regex::escape(term)
}

pub fn highlight(text: &str, term: &str) -> String {
    Highlighter::default().highlight(text, term)
}

#[derive(Debug, Clone)]
pub struct SearchEngine {
    pub min_term_length: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub highlighter: Highlighter,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self {
            min_term_length: MIN_TERM_LENGTH,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            highlighter: Highlighter::default(),
        }
    }
}

impl SearchEngine {
    pub fn search(
        &self,
        store: &impl PostStore,
        request: &SearchRequest,
    ) -> Result<SearchPage, SearchError> {
        let pagination = Pagination::normalize(
            request.page,
            request.page_size,
            self.default_page_size,
            self.max_page_size,
        );
        let term = request.term.trim();

        if term.chars().count() < self.min_term_length {
            return Ok(SearchPage::empty(
                pagination.page,
                term,
                Some(format!(
                    "Search query must be at least {} characters long",
                    self.min_term_length
                )),
            ));
        }

        let category = match request.category.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(
                Uuid::parse_str(raw).map_err(|_| SearchError::InvalidCategory(raw.to_string()))?,
            ),
            _ => None,
        };

        let status = match request.status.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw
                .parse::<StatusFilter>()
                .map_err(|_| SearchError::InvalidStatus(raw.to_string()))?,
            _ => StatusFilter::default(),
        };

        let filter = PostFilter {
            text: Some(term.to_string()),
            include_tags: true,
            category,
            status,
            ..PostFilter::default()
        };

        let total = store.count_posts(&filter)?;
        let mut posts = match pagination.window(total) {
            Some(skip) => {
                store.find_posts(&filter, PostSort::PublishedDesc, skip, pagination.per_page)?
            }
            None => Vec::new(),
        };

        if let Some(re) = Highlighter::pattern(term) {
            for post in &mut posts {
                post.title = self.highlighter.apply(&re, &post.title);
                post.excerpt = self.highlighter.apply(&re, &post.excerpt);
            }
        }

        let total_pages = pagination.total_pages(total);
        tracing::debug!(term, total, page = pagination.page, "search executed");

        Ok(SearchPage {
            posts,
            total,
            page: pagination.page,
            total_pages,
            has_next_page: (pagination.page as u64) < total_pages,
            has_prev_page: pagination.page > 1,
            query: term.to_string(),
            message: None,
        })
    }
}

/// Search with the default engine settings.
pub fn search_posts(
    store: &impl PostStore,
    request: &SearchRequest,
) -> Result<SearchPage, SearchError> {
    SearchEngine::default().search(store, request)
}
