use crate::models::{
    AffiliateLink, Category, CategoryRef, CreatePost, Post, PostStatus, PostSummary, Session,
    StatusFilter, UpdatePost, UserSummary,
};
use crate::services::error::{invalid, ContentError};
use crate::services::search::Pagination;
use crate::services::slug::{normalize_slug, SlugKind, SlugResolver, TableSlugs};
use crate::db::timestamp;
use crate::config::ContentConfig;
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, ToSql};
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

const WORDS_PER_MINUTE: usize = 200;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

/// Limits applied on the write path.
#[derive(Debug, Clone)]
pub struct PostRules {
    pub max_title_length: usize,
    pub min_content_length: usize,
    pub max_excerpt_length: usize,
    pub slug_max_attempts: usize,
}

impl Default for PostRules {
    fn default() -> Self {
        Self {
            max_title_length: 200,
            min_content_length: 100,
            max_excerpt_length: 300,
            slug_max_attempts: crate::services::slug::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl From<&ContentConfig> for PostRules {
    fn from(config: &ContentConfig) -> Self {
        Self {
            max_title_length: config.max_title_length,
            min_content_length: config.min_content_length,
            max_excerpt_length: config.max_excerpt_length,
            slug_max_attempts: config.slug_max_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSort {
    /// Publish date descending, then creation date descending.
    PublishedDesc,
    CreatedDesc,
}

impl PostSort {
    fn order_by(&self) -> &'static str {
        match self {
            Self::PublishedDesc => "p.published_at DESC, p.created_at DESC, p.id DESC",
            Self::CreatedDesc => "p.created_at DESC, p.id DESC",
        }
    }
}

/// Conjunction of optional restrictions on the posts collection.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Case-insensitive substring over title, content and excerpt.
    pub text: Option<String>,
    /// Let `text` also match a tag exactly, ignoring case.
    pub include_tags: bool,
    pub tag: Option<String>,
    pub category: Option<Uuid>,
    pub status: StatusFilter,
}

impl PostFilter {
    fn to_sql(&self) -> (String, Vec<String>) {
        let mut sql = String::from(" WHERE 1=1");
        let mut params = Vec::new();

        if let Some(text) = &self.text {
            sql.push_str(
                " AND (contains_ci(p.title, ?) OR contains_ci(p.content, ?) OR contains_ci(p.excerpt, ?)",
            );
            params.extend(std::iter::repeat(text.clone()).take(3));
            if self.include_tags {
                sql.push_str(
                    " OR EXISTS (SELECT 1 FROM post_tags t WHERE t.post_id = p.id AND eq_ci(t.tag, ?))",
                );
                params.push(text.clone());
            }
            sql.push(')');
        }
        if let Some(tag) = &self.tag {
            sql.push_str(" AND EXISTS (SELECT 1 FROM post_tags t WHERE t.post_id = p.id AND t.tag = ?)");
            params.push(tag.clone());
        }
        if let Some(category) = self.category {
            sql.push_str(" AND p.category_id = ?");
            params.push(category.to_string());
        }
        if let Some(status) = self.status.status() {
            sql.push_str(" AND p.status = ?");
            params.push(status.to_string());
        }

        (sql, params)
    }
}

/// Query side of the posts collection.
pub trait PostStore {
    fn count_posts(&self, filter: &PostFilter) -> Result<u64>;
    fn find_posts(
        &self,
        filter: &PostFilter,
        sort: PostSort,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PostSummary>>;
}

impl PostStore for Connection {
    fn count_posts(&self, filter: &PostFilter) -> Result<u64> {
        let (where_sql, params) = filter.to_sql();
        let sql = format!("SELECT COUNT(*) FROM posts p{}", where_sql);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|s| s as &dyn ToSql).collect();
        let count: i64 = self.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn find_posts(
        &self,
        filter: &PostFilter,
        sort: PostSort,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PostSummary>> {
        let (where_sql, params) = filter.to_sql();
        let sql = format!(
            "{}{} ORDER BY {} LIMIT ? OFFSET ?",
            SUMMARY_SELECT,
            where_sql,
            sort.order_by()
        );
        let limit = i64::try_from(limit)?;
        let skip = i64::try_from(skip)?;
        let param_refs: Vec<&dyn ToSql> = params
            .iter()
            .map(|s| s as &dyn ToSql)
            .chain(std::iter::once(&limit as &dyn ToSql))
            .chain(std::iter::once(&skip as &dyn ToSql))
            .collect();

        let mut stmt = self.prepare(&sql)?;
        let mut posts = stmt
            .query_map(param_refs.as_slice(), row_to_summary)?
            .collect::<Result<Vec<_>, _>>()?;

        for post in &mut posts {
            post.tags = load_tags(self, post.id)?;
        }
        Ok(posts)
    }
}

const SUMMARY_SELECT: &str = r#"
    SELECT p.id, p.title, p.slug, p.excerpt, p.featured_image, p.status, p.is_featured,
           p.read_time, p.view_count, p.published_at, p.created_at, p.updated_at, p.category_id,
           c.id, c.name, c.slug, c.description, c.language, c.created_at, c.updated_at,
           u.id, u.name, u.email
    FROM posts p
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN users u ON u.id = p.author_id"#;

const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.slug, p.content, p.excerpt, p.featured_image, p.author_id, p.category_id,
           p.status, p.is_featured, p.seo_title, p.seo_description, p.seo_keywords, p.affiliate_links,
           p.read_time, p.view_count, p.like_count, p.published_at, p.content_images,
           p.created_at, p.updated_at,
           c.id, c.name, c.slug, c.description, c.language, c.created_at, c.updated_at,
           u.id, u.name, u.email
    FROM posts p
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN users u ON u.id = p.author_id"#;

pub(crate) fn uuid_at(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_at<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Text column holding one of an enum's wire names.
pub(crate) fn parsed_at<T: FromStr>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognized value '{}'", raw).into(),
        )
    })
}

/// Category columns start at `base`; all NULL when the join found nothing.
fn category_at(row: &Row, base: usize, category_id: Uuid) -> rusqlite::Result<CategoryRef> {
    let joined: Option<String> = row.get(base)?;
    if joined.is_none() {
        return Ok(CategoryRef::Unresolved(category_id));
    }
    Ok(CategoryRef::Resolved(Category {
        id: uuid_at(row, base)?,
        name: row.get(base + 1)?,
        slug: row.get(base + 2)?,
        description: row.get(base + 3)?,
        language: parsed_at(row, base + 4)?,
        created_at: row.get(base + 5)?,
        updated_at: row.get(base + 6)?,
    }))
}

fn author_at(row: &Row, base: usize) -> rusqlite::Result<Option<UserSummary>> {
    let joined: Option<String> = row.get(base)?;
    if joined.is_none() {
        return Ok(None);
    }
    Ok(Some(UserSummary {
        id: uuid_at(row, base)?,
        name: row.get(base + 1)?,
        email: row.get(base + 2)?,
    }))
}

fn row_to_summary(row: &Row) -> rusqlite::Result<PostSummary> {
    let category_id = uuid_at(row, 12)?;
    Ok(PostSummary {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        excerpt: row.get(3)?,
        featured_image: row.get(4)?,
        status: parsed_at(row, 5)?,
        is_featured: row.get(6)?,
        read_time: row.get(7)?,
        view_count: row.get(8)?,
        published_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        category: category_at(row, 13, category_id)?,
        author: author_at(row, 20)?,
        tags: Vec::new(),
    })
}

fn row_to_post(row: &Row) -> rusqlite::Result<Post> {
    let category_id = uuid_at(row, 7)?;
    Ok(Post {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        content: row.get(3)?,
        excerpt: row.get(4)?,
        featured_image: row.get(5)?,
        author_id: uuid_at(row, 6)?,
        status: parsed_at(row, 8)?,
        is_featured: row.get(9)?,
        seo_title: row.get(10)?,
        seo_description: row.get(11)?,
        seo_keywords: json_at(row, 12)?,
        affiliate_links: json_at(row, 13)?,
        read_time: row.get(14)?,
        view_count: row.get(15)?,
        like_count: row.get(16)?,
        published_at: row.get(17)?,
        content_images: json_at(row, 18)?,
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
        category: category_at(row, 21, category_id)?,
        author: author_at(row, 28)?,
        tags: Vec::new(),
    })
}

fn load_tags(conn: &Connection, post_id: Uuid) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT tag FROM post_tags WHERE post_id = ? ORDER BY rowid")?;
    let tags = stmt
        .query_map([post_id.to_string()], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tags)
}

fn replace_tags(conn: &Connection, post_id: Uuid, tags: &[String]) -> Result<()> {
    let id = post_id.to_string();
    conn.execute("DELETE FROM post_tags WHERE post_id = ?", [&id])?;
    for tag in tags {
        conn.execute(
            "INSERT OR IGNORE INTO post_tags (post_id, tag) VALUES (?, ?)",
            (&id, tag),
        )?;
    }
    Ok(())
}

/// Minutes to read `content` at 200 words per minute, markup excluded.
pub fn estimate_read_time(content: &str) -> i64 {
    let text = HTML_TAG.replace_all(content, " ");
    let words = text.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE) as i64
}

/// Trim, drop empties and duplicates, keep first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = Vec::<String>::with_capacity(tags.len());
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !seen.iter().any(|s| s == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

pub fn sanitize_content(html: &str) -> String {
    ammonia::clean(html)
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| invalid(format!("Invalid {} ID", what)))
}

fn category_exists(conn: &Connection, id: Uuid) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?)",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn validate_category(conn: &Connection, raw: &str) -> Result<Uuid> {
    let id = parse_id(raw, "category")?;
    if !category_exists(conn, id)? {
        return Err(invalid("Category not found"));
    }
    Ok(id)
}

fn validate_title(title: &str, rules: &PostRules) -> Result<()> {
    if title.trim().is_empty() {
        return Err(invalid("Title is required"));
    }
    if title.trim().chars().count() > rules.max_title_length {
        return Err(invalid(format!(
            "Title must be {} characters or less",
            rules.max_title_length
        )));
    }
    Ok(())
}

fn validate_content(content: &str, rules: &PostRules) -> Result<()> {
    if content.chars().count() < rules.min_content_length {
        return Err(invalid(format!(
            "Content must be at least {} characters",
            rules.min_content_length
        )));
    }
    Ok(())
}

fn validate_excerpt(excerpt: &str, rules: &PostRules) -> Result<()> {
    if excerpt.trim().is_empty() {
        return Err(invalid("Excerpt is required"));
    }
    if excerpt.chars().count() > rules.max_excerpt_length {
        return Err(invalid(format!(
            "Excerpt must be {} characters or less",
            rules.max_excerpt_length
        )));
    }
    Ok(())
}

/// Any RFC 3339 instant, stored in the same UTC form as `timestamp()` so
/// publish dates keep sorting as text.
pub fn parse_publish_date(raw: &str) -> Result<String> {
    chrono::DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| {
            dt.with_timezone(&chrono::Utc)
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        })
        .map_err(|_| invalid("Invalid publishedAt"))
}

fn write_with_slug<T>(
    conn: &Connection,
    title: &str,
    exclude_id: Option<Uuid>,
    rules: &PostRules,
    write: impl FnMut(&str) -> Result<T>,
) -> Result<T> {
    SlugResolver::new(rules.slug_max_attempts).write_with_slug(
        title,
        SlugKind::Post,
        &TableSlugs::posts(conn),
        exclude_id,
        write,
    )
}

pub fn create_post(
    conn: &Connection,
    input: CreatePost,
    author_id: Uuid,
    rules: &PostRules,
) -> Result<Post> {
    let title = input.title.trim().to_string();
    validate_title(&title, rules)?;
    validate_content(&input.content, rules)?;
    validate_excerpt(&input.excerpt, rules)?;
    if input.featured_image.trim().is_empty() {
        return Err(invalid("Featured image is required"));
    }
    let category_id = validate_category(conn, &input.category)?;

    let id = Uuid::new_v4();
    let now = timestamp();
    let content = sanitize_content(&input.content);
    let read_time = estimate_read_time(&content);
    let tags = normalize_tags(&input.tags);
    let seo_title = input.seo_title.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| title.clone());
    let seo_description = input
        .seo_description
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| input.excerpt.clone());
    let seo_keywords = input.seo_keywords.unwrap_or_else(|| tags.clone());
    let published_at = (input.status == PostStatus::Published).then(|| now.clone());

    write_with_slug(conn, &title, None, rules, |slug| {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO posts (id, title, slug, content, excerpt, featured_image, author_id, category_id,
                               status, is_featured, seo_title, seo_description, seo_keywords, affiliate_links,
                               read_time, published_at, content_images, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                id.to_string(),
                &title,
                slug,
                &content,
                &input.excerpt,
                &input.featured_image,
                author_id.to_string(),
                category_id.to_string(),
                input.status.to_string(),
                input.is_featured,
                &seo_title,
                &seo_description,
                serde_json::to_string(&seo_keywords)?,
                serde_json::to_string(&input.affiliate_links)?,
                read_time,
                &published_at,
                serde_json::to_string(&input.content_images)?,
                &now,
                &now,
            ],
        )?;
        replace_tags(&tx, id, &tags)?;
        tx.commit()?;
        Ok(())
    })?;

    tracing::info!("Post {} created", id);
    get_post(conn, id)?.ok_or_else(|| ContentError::NotFound("Post not found").into())
}

pub fn update_post(
    conn: &Connection,
    id: Uuid,
    patch: UpdatePost,
    session: &Session,
    rules: &PostRules,
) -> Result<Post> {
    let current = get_post(conn, id)?.ok_or(ContentError::NotFound("Post not found"))?;
    if !session.can_modify(current.author_id) {
        bail!(ContentError::Forbidden);
    }

    if let Some(title) = &patch.title {
        validate_title(title, rules)?;
    }
    if let Some(content) = &patch.content {
        validate_content(content, rules)?;
    }
    if let Some(excerpt) = &patch.excerpt {
        validate_excerpt(excerpt, rules)?;
    }
    let explicit_date = patch
        .published_at
        .as_deref()
        .map(parse_publish_date)
        .transpose()?;
    let category_id = match &patch.category {
        Some(raw) => validate_category(conn, raw)?,
        None => current.category.id(),
    };

    let retitled = patch.title.is_some();
    let title = patch
        .title
        .map(|t| t.trim().to_string())
        .unwrap_or_else(|| current.title.clone());
    let content = patch
        .content
        .map(|c| sanitize_content(&c))
        .unwrap_or(current.content);
    let read_time = estimate_read_time(&content);
    let status = patch.status.unwrap_or(current.status);
    let published_at = match explicit_date {
        Some(explicit) => Some(explicit),
        None if status == PostStatus::Published && current.published_at.is_none() => {
            Some(timestamp())
        }
        None => current.published_at,
    };
    let tags = patch.tags.as_deref().map(normalize_tags);
    let affiliate_links: Vec<AffiliateLink> =
        patch.affiliate_links.unwrap_or(current.affiliate_links);
    let excerpt = patch.excerpt.unwrap_or(current.excerpt);
    let featured_image = patch.featured_image.unwrap_or(current.featured_image);
    let is_featured = patch.is_featured.unwrap_or(current.is_featured);
    let seo_title = patch.seo_title.or(current.seo_title);
    let seo_description = patch.seo_description.or(current.seo_description);
    let seo_keywords = patch.seo_keywords.unwrap_or(current.seo_keywords);
    let content_images = patch.content_images.unwrap_or(current.content_images);

    let write = |slug: &str| -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            r#"
            UPDATE posts SET title = ?, slug = ?, content = ?, excerpt = ?, featured_image = ?,
                   category_id = ?, status = ?, is_featured = ?, seo_title = ?, seo_description = ?,
                   seo_keywords = ?, affiliate_links = ?, read_time = ?, published_at = ?,
                   content_images = ?, updated_at = ?
            WHERE id = ?
            "#,
            rusqlite::params![
                &title,
                slug,
                &content,
                &excerpt,
                &featured_image,
                category_id.to_string(),
                status.to_string(),
                is_featured,
                &seo_title,
                &seo_description,
                serde_json::to_string(&seo_keywords)?,
                serde_json::to_string(&affiliate_links)?,
                read_time,
                &published_at,
                serde_json::to_string(&content_images)?,
                timestamp(),
                id.to_string(),
            ],
        )?;
        if let Some(tags) = &tags {
            replace_tags(&tx, id, tags)?;
        }
        tx.commit()?;
        Ok(())
    };

    if retitled {
        write_with_slug(conn, &title, Some(id), rules, write)?;
    } else {
        write(&current.slug)?;
    }

    get_post(conn, id)?.ok_or_else(|| ContentError::NotFound("Post not found").into())
}

pub fn delete_post(conn: &Connection, id: Uuid, session: &Session) -> Result<Post> {
    let post = get_post(conn, id)?.ok_or(ContentError::NotFound("Post not found"))?;
    if !session.can_modify(post.author_id) {
        bail!(ContentError::Forbidden);
    }
    conn.execute("DELETE FROM posts WHERE id = ?", [id.to_string()])?;
    tracing::info!("Post {} deleted by {}", id, session.user.id);
    Ok(post)
}

pub fn get_post(conn: &Connection, id: Uuid) -> Result<Option<Post>> {
    let sql = format!("{} WHERE p.id = ?", POST_SELECT);
    let post = conn
        .query_row(&sql, [id.to_string()], row_to_post)
        .optional()?;
    match post {
        Some(mut p) => {
            p.tags = load_tags(conn, p.id)?;
            Ok(Some(p))
        }
        None => Ok(None),
    }
}

/// Public lookup by slug. Counts as a view.
pub fn get_post_by_slug(conn: &Connection, slug: &str) -> Result<Option<Post>> {
    if slug.chars().count() < 2 {
        return Err(invalid("Invalid slug"));
    }
    let updated = conn.execute(
        "UPDATE posts SET view_count = view_count + 1 WHERE slug = ?",
        [slug],
    )?;
    if updated == 0 {
        return Ok(None);
    }
    let sql = format!("{} WHERE p.slug = ?", POST_SELECT);
    let post = conn.query_row(&sql, [slug], row_to_post).optional()?;
    match post {
        Some(mut p) => {
            p.tags = load_tags(conn, p.id)?;
            Ok(Some(p))
        }
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: usize,
    pub total_pages: u64,
    pub total_posts: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostList {
    pub posts: Vec<PostSummary>,
    pub pagination: PageInfo,
}

pub fn list_posts(
    store: &impl PostStore,
    query: &ListQuery,
    default_size: usize,
    max_size: usize,
) -> Result<PostList> {
    let pagination = Pagination::normalize(query.page, query.limit, default_size, max_size);

    let category = match query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(raw) => Some(parse_id(raw, "category")?),
        None => None,
    };
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<StatusFilter>()
            .map_err(|_| invalid(format!("Invalid status '{}'", raw)))?,
        None => StatusFilter::default(),
    };

    let filter = PostFilter {
        text: query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
        include_tags: false,
        tag: query
            .tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from),
        category,
        status,
    };

    let total = store.count_posts(&filter)?;
    let posts = match pagination.window(total) {
        Some(skip) => store.find_posts(&filter, PostSort::CreatedDesc, skip, pagination.per_page)?,
        None => Vec::new(),
    };
    let total_pages = pagination.total_pages(total);

    Ok(PostList {
        posts,
        pagination: PageInfo {
            current_page: pagination.page,
            total_pages,
            total_posts: total,
            has_next_page: (pagination.page as u64) < total_pages,
            has_prev_page: pagination.page > 1,
        },
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlugRepair {
    pub id: Uuid,
    pub title: String,
    pub old_slug: String,
    pub new_slug: String,
}

/// Re-derive slugs that are blank or bare hyphens, e.g. from legacy imports.
pub fn fix_slugs(conn: &Connection, rules: &PostRules) -> Result<Vec<SlugRepair>> {
    let mut stmt = conn.prepare("SELECT id, title, slug FROM posts ORDER BY created_at")?;
    let broken = stmt
        .query_map([], |row| {
            Ok((uuid_at(row, 0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|(_, _, slug)| normalize_slug(slug).is_empty())
        .collect::<Vec<_>>();

    let mut repairs = Vec::with_capacity(broken.len());
    for (id, title, old_slug) in broken {
        let new_slug = write_with_slug(conn, &title, Some(id), rules, |slug| {
            conn.execute(
                "UPDATE posts SET slug = ?, updated_at = ? WHERE id = ?",
                (slug, timestamp(), id.to_string()),
            )?;
            Ok(slug.to_string())
        })?;
        tracing::info!("Repaired slug of post {}: '{}' -> '{}'", id, old_slug, new_slug);
        repairs.push(SlugRepair {
            id,
            title,
            old_slug,
            new_slug,
        });
    }
    Ok(repairs)
}
