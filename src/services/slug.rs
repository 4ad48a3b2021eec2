//! Slug derivation for posts and categories.
//!
//! A slug keeps Bengali letters, ASCII lowercase letters and digits, joined by
//! single hyphens. Uniqueness is settled against the owning collection one
//! candidate at a time: `foo`, `foo-1`, `foo-2`, ...

use crate::db::is_unique_violation;
use crate::services::error::ContentError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_MAX_ATTEMPTS: usize = 10_000;
pub const MAX_SLUG_LENGTH: usize = 250;
/// How often a write re-runs resolution after losing a race on the unique
/// slug index before giving up.
pub const SLUG_CONFLICT_RETRIES: usize = 3;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\u{0980}-\u{09FF}a-z0-9\s-]").expect("valid slug pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid slug pattern"));
static HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid slug pattern"));
static WIRE_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\u{0980}-\u{09FF}a-z0-9]+(-[\u{0980}-\u{09FF}a-z0-9]+)*$")
        .expect("valid slug pattern")
});

/// Which collection a slug belongs to. Decides the fallback prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugKind {
    Post,
    Category,
}

impl SlugKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Category => "category",
        }
    }

    /// Table whose unique `slug` column backs this collection.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Post => "posts",
            Self::Category => "categories",
        }
    }
}

#[derive(Debug, Error)]
pub enum SlugError {
    /// Every candidate up to the cap was taken. Points at a corrupt
    /// uniqueness index rather than a legitimately crowded namespace.
    #[error("slug '{base}' still conflicts after {attempts} attempts")]
    Exhausted { base: String, attempts: usize },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Asks the owning collection whether `candidate` is already taken by a
/// document other than `exclude_id`.
pub trait SlugCheck {
    fn slug_exists(&self, candidate: &str, exclude_id: Option<Uuid>) -> anyhow::Result<bool>;
}

impl<F> SlugCheck for F
where
    F: Fn(&str, Option<Uuid>) -> anyhow::Result<bool>,
{
    fn slug_exists(&self, candidate: &str, exclude_id: Option<Uuid>) -> anyhow::Result<bool> {
        self(candidate, exclude_id)
    }
}

/// Reduce free text to slug form. May return an empty string.
pub fn normalize_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let kept = DISALLOWED.replace_all(&lowered, "");
    let hyphenated = WHITESPACE.replace_all(&kept, "-");
    let collapsed = HYPHENS.replace_all(&hyphenated, "-");
    collapsed.trim_matches('-').trim().to_string()
}

/// Slug base for `title`, falling back to `<prefix>-<unix millis>` when
/// nothing usable survives normalization.
pub fn base_slug(title: &str, kind: SlugKind) -> String {
    let slug = normalize_slug(title);
    if slug.is_empty() {
        format!("{}-{}", kind.prefix(), chrono::Utc::now().timestamp_millis())
    } else {
        slug
    }
}

pub fn validate_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.chars().count() <= MAX_SLUG_LENGTH && WIRE_FORMAT.is_match(slug)
}

#[derive(Debug, Clone, Copy)]
pub struct SlugResolver {
    max_attempts: usize,
}

impl Default for SlugResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl SlugResolver {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Derive a slug from `title` that `check` reports as free.
    ///
    /// Each candidate costs one round trip to the store; nothing is
    /// prefetched because the store may change between calls. The store's
    /// unique index remains the final arbiter.
    pub fn resolve(
        &self,
        title: &str,
        kind: SlugKind,
        check: &impl SlugCheck,
        exclude_id: Option<Uuid>,
    ) -> Result<String, SlugError> {
        self.resolve_base(&base_slug(title, kind), check, exclude_id)
    }

    /// Uniqueness loop over an already-normalized base.
    pub fn resolve_base(
        &self,
        base: &str,
        check: &impl SlugCheck,
        exclude_id: Option<Uuid>,
    ) -> Result<String, SlugError> {
        let mut candidate = base.to_string();
        for suffix in 1..=self.max_attempts {
            if !check.slug_exists(&candidate, exclude_id)? {
                return Ok(candidate);
            }
            candidate = format!("{}-{}", base, suffix);
        }

        Err(SlugError::Exhausted {
            base: base.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Run `write` with a freshly resolved slug, re-resolving when the unique
    /// index rejects it because a concurrent writer claimed the candidate
    /// between the check and the write.
    pub fn write_with_slug<T>(
        &self,
        title: &str,
        kind: SlugKind,
        check: &impl SlugCheck,
        exclude_id: Option<Uuid>,
        mut write: impl FnMut(&str) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        for attempt in 1..=SLUG_CONFLICT_RETRIES {
            let slug = self.resolve(title, kind, check, exclude_id)?;
            match write(&slug) {
                Ok(value) => return Ok(value),
                Err(e) if is_unique_violation(&e, kind.table(), "slug") => {
                    tracing::warn!(
                        "{} slug '{}' taken concurrently (attempt {})",
                        kind.prefix(),
                        slug,
                        attempt
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(ContentError::Conflict(format!("Could not claim a unique slug for '{}'", title)).into())
    }
}

/// Resolve with the default attempt cap.
pub fn resolve_slug(
    title: &str,
    kind: SlugKind,
    check: &impl SlugCheck,
    exclude_id: Option<Uuid>,
) -> Result<String, SlugError> {
    SlugResolver::default().resolve(title, kind, check, exclude_id)
}

/// Store-backed check for one collection's `slug` column.
pub struct TableSlugs<'a> {
    conn: &'a rusqlite::Connection,
    table: &'static str,
}

impl<'a> TableSlugs<'a> {

    pub fn posts(conn: &'a rusqlite::Connection) -> Self {
        Self {
            conn,
            table: SlugKind::Post.table(),
        }
    }

    pub fn categories(conn: &'a rusqlite::Connection) -> Self {
        Self {
            conn,
            table: SlugKind::Category.table(),
        }
    }
}

impl SlugCheck for TableSlugs<'_> {
    fn slug_exists(&self, candidate: &str, exclude_id: Option<Uuid>) -> anyhow::Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE slug = ?1 AND (?2 IS NULL OR id != ?2))",
            self.table
        );
        let exclude = exclude_id.map(|id| id.to_string());
        let exists: bool = self
            .conn
            .query_row(&sql, rusqlite::params![candidate, exclude], |row| row.get(0))?;
        Ok(exists)
    }
}
