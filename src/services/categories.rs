use crate::db::{is_unique_violation, timestamp};
use crate::models::{Category, CreateCategory, Language, UpdateCategory};
use crate::services::error::{invalid, ContentError};
use crate::services::posts::{parsed_at, uuid_at};
use crate::services::slug::{SlugKind, SlugResolver, TableSlugs};
use anyhow::{bail, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 300;

const CATEGORY_SELECT: &str =
    "SELECT id, name, slug, description, language, created_at, updated_at FROM categories";

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        language: parsed_at(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(invalid("Name is required"));
    }
    if name.trim().chars().count() > MAX_NAME_LENGTH {
        return Err(invalid(format!(
            "Name must be {} characters or less",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<()> {
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LENGTH) {
        return Err(invalid(format!(
            "Description must be {} characters or less",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(())
}

fn name_taken(conn: &Connection, name: &str, language: Language, exclude: Option<Uuid>) -> Result<bool> {
    let exclude = exclude.map(|id| id.to_string());
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE name = ?1 AND language = ?2 AND (?3 IS NULL OR id != ?3))",
        rusqlite::params![name, language.to_string(), exclude],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// The name pre-check can lose a race against the `(name, language)` index;
/// report that as the same conflict the pre-check would have.
pub(crate) fn duplicate_name_conflict(err: anyhow::Error) -> anyhow::Error {
    if is_unique_violation(&err, "categories", "name") {
        return ContentError::Conflict("A category with this name already exists".to_string()).into();
    }
    err
}

fn write_with_slug(
    conn: &Connection,
    name: &str,
    exclude_id: Option<Uuid>,
    resolver: &SlugResolver,
    write: impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    resolver
        .write_with_slug(
            name,
            SlugKind::Category,
            &TableSlugs::categories(conn),
            exclude_id,
            write,
        )
        .map_err(duplicate_name_conflict)
}

pub fn list_categories(conn: &Connection, language: Option<Language>) -> Result<Vec<Category>> {
    let categories = match language {
        Some(lang) => {
            let mut stmt = conn.prepare(&format!("{} WHERE language = ? ORDER BY name", CATEGORY_SELECT))?;
            let rows = stmt
                .query_map([lang.to_string()], row_to_category)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!("{} ORDER BY name", CATEGORY_SELECT))?;
            let rows = stmt
                .query_map([], row_to_category)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(categories)
}

pub fn get_category(conn: &Connection, id: Uuid) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            &format!("{} WHERE id = ?", CATEGORY_SELECT),
            [id.to_string()],
            row_to_category,
        )
        .optional()?;
    Ok(category)
}

pub fn get_category_by_slug(conn: &Connection, slug: &str) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            &format!("{} WHERE slug = ?", CATEGORY_SELECT),
            [slug],
            row_to_category,
        )
        .optional()?;
    Ok(category)
}

pub fn create_category(
    conn: &Connection,
    input: CreateCategory,
    resolver: &SlugResolver,
) -> Result<Category> {
    let name = input.name.trim().to_string();
    validate_name(&name)?;
    validate_description(input.description.as_deref())?;
    if name_taken(conn, &name, input.language, None)? {
        bail!(ContentError::Conflict(
            "A category with this name already exists".to_string()
        ));
    }

    let id = Uuid::new_v4();
    let now = timestamp();
    write_with_slug(conn, &name, None, resolver, |slug| {
        conn.execute(
            "INSERT INTO categories (id, name, slug, description, language, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                id.to_string(),
                &name,
                slug,
                &input.description,
                input.language.to_string(),
                &now,
                &now,
            ],
        )?;
        Ok(())
    })?;

    tracing::info!("Category '{}' created", name);
    get_category(conn, id)?.ok_or_else(|| ContentError::NotFound("Category not found").into())
}

pub fn update_category(
    conn: &Connection,
    id: Uuid,
    patch: UpdateCategory,
    resolver: &SlugResolver,
) -> Result<Category> {
    let current = get_category(conn, id)?.ok_or(ContentError::NotFound("Category not found"))?;

    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    validate_description(patch.description.as_deref())?;

    let renamed = patch.name.is_some();
    let name = patch
        .name
        .map(|n| n.trim().to_string())
        .unwrap_or(current.name);
    let language = patch.language.unwrap_or(current.language);
    let description = patch.description.or(current.description);

    if name_taken(conn, &name, language, Some(id))? {
        bail!(ContentError::Conflict(
            "A category with this name already exists".to_string()
        ));
    }

    let write = |slug: &str| -> Result<()> {
        conn.execute(
            "UPDATE categories SET name = ?, slug = ?, description = ?, language = ?, updated_at = ? WHERE id = ?",
            rusqlite::params![
                &name,
                slug,
                &description,
                language.to_string(),
                timestamp(),
                id.to_string(),
            ],
        )?;
        Ok(())
    };

    if renamed {
        write_with_slug(conn, &name, Some(id), resolver, write)?;
    } else {
        write(&current.slug).map_err(duplicate_name_conflict)?;
    }

    get_category(conn, id)?.ok_or_else(|| ContentError::NotFound("Category not found").into())
}

/// Refused while any post still files under the category.
pub fn delete_category(conn: &Connection, id: Uuid) -> Result<Category> {
    let category = get_category(conn, id)?.ok_or(ContentError::NotFound("Category not found"))?;
    let in_use: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE category_id = ?",
        [id.to_string()],
        |row| row.get(0),
    )?;
    if in_use > 0 {
        bail!(ContentError::Conflict(format!(
            "Category is used by {} post(s)",
            in_use
        )));
    }
    conn.execute("DELETE FROM categories WHERE id = ?", [id.to_string()])?;
    tracing::info!("Category '{}' deleted", category.name);
    Ok(category)
}
