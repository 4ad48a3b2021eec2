use crate::models::StatusFilter;
use crate::services::posts::{PostFilter, PostSort, PostStore};
use crate::services::{categories, tags};
use anyhow::Result;
use rusqlite::Connection;
use url::Url;

const MAX_SITEMAP_POSTS: usize = 1000;
const STATIC_PAGES: [(&str, &str, &str); 3] = [
    ("", "daily", "1.0"),
    ("blog", "weekly", "0.8"),
    ("search", "weekly", "0.8"),
];
const DISALLOWED_PATHS: [&str; 3] = ["/admin/", "/api/auth/", "/private/"];

struct Entry {
    loc: String,
    lastmod: Option<String>,
    changefreq: &'static str,
    priority: &'static str,
}

/// Absolute URL for `path` under the site root. Non-ASCII segments come back
/// percent-encoded.
pub fn page_url(base: &Url, path: &str) -> Result<String> {
    let mut root = base.clone();
    if !root.path().ends_with('/') {
        let with_slash = format!("{}/", root.path());
        root.set_path(&with_slash);
    }
    Ok(root.join(path.trim_start_matches('/'))?.to_string())
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn date_part(timestamp: &str) -> String {
    timestamp.split('T').next().unwrap_or(timestamp).to_string()
}

pub fn generate_sitemap(conn: &Connection, base: &Url) -> Result<String> {
    let mut entries = Vec::new();

    for (path, changefreq, priority) in STATIC_PAGES {
        entries.push(Entry {
            loc: page_url(base, path)?,
            lastmod: None,
            changefreq,
            priority,
        });
    }

    let published = PostFilter {
        status: StatusFilter::default(),
        ..PostFilter::default()
    };
    for post in conn.find_posts(&published, PostSort::PublishedDesc, 0, MAX_SITEMAP_POSTS)? {
        entries.push(Entry {
            loc: page_url(base, &format!("blog/{}", post.slug))?,
            lastmod: Some(date_part(&post.updated_at)),
            changefreq: "weekly",
            priority: "0.7",
        });
    }

    for category in categories::list_categories(conn, None)? {
        entries.push(Entry {
            loc: page_url(base, &format!("blog/category/{}", category.slug))?,
            lastmod: Some(date_part(&category.updated_at)),
            changefreq: "weekly",
            priority: "0.6",
        });
    }

    for tag in tags::list_tags_with_counts(conn)? {
        entries.push(Entry {
            loc: page_url(base, &format!("blog/tag/{}", tag.name))?,
            lastmod: None,
            changefreq: "weekly",
            priority: "0.5",
        });
    }

    let mut urls = String::new();
    for entry in entries {
        urls.push_str("  <url>\n");
        urls.push_str(&format!("    <loc>{}</loc>\n", xml_escape(&entry.loc)));
        if let Some(lastmod) = entry.lastmod {
            urls.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod));
        }
        urls.push_str(&format!(
            "    <changefreq>{}</changefreq>\n    <priority>{}</priority>\n  </url>\n",
            entry.changefreq, entry.priority
        ));
    }

    Ok(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}</urlset>
"#,
        urls
    ))
}

pub fn generate_robots(base: &Url) -> Result<String> {
    let mut robots = String::from("User-agent: *\nAllow: /\n");
    for path in DISALLOWED_PATHS {
        robots.push_str(&format!("Disallow: {}\n", path));
    }
    robots.push_str(&format!("\nSitemap: {}\n", page_url(base, "sitemap.xml")?));
    robots.push_str(&format!("Host: {}\n", base.as_str().trim_end_matches('/')));
    Ok(robots)
}
