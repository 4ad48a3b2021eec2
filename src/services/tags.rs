use crate::models::TagWithCount;
use anyhow::Result;
use rusqlite::Connection;

/// Tags in use by published posts, most used first.
pub fn list_tags_with_counts(conn: &Connection) -> Result<Vec<TagWithCount>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT t.tag, COUNT(*) as count
        FROM post_tags t
        JOIN posts p ON p.id = t.post_id AND p.status = 'published'
        GROUP BY t.tag
        ORDER BY count DESC, t.tag
        "#,
    )?;
    let tags = stmt
        .query_map([], |row| {
            Ok(TagWithCount {
                name: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

/// Tag names on published posts containing `fragment`, for autocompletion.
pub fn suggest_tags(conn: &Connection, fragment: &str, limit: usize) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT t.tag
        FROM post_tags t
        JOIN posts p ON p.id = t.post_id AND p.status = 'published'
        WHERE contains_ci(t.tag, ?)
        ORDER BY t.tag
        LIMIT ?
        "#,
    )?;
    let tags = stmt
        .query_map((fragment, limit as i64), |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tags)
}
