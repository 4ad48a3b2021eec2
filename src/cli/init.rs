use anyhow::Result;
use std::path::PathBuf;

pub async fn run(path: PathBuf, name: Option<String>) -> Result<()> {
    let site_name = name.unwrap_or_else(|| "NewsNiche".to_string());
    let config_path = path.join("newsniche.toml");
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }

    std::fs::create_dir_all(path.join("data"))?;

    let config = format!(
        r#"[site]
title = "{}"
description = "বাংলা ও ইংরেজি ব্লগ"
url = "http://localhost:3000"
language = "bn"

[server]
host = "127.0.0.1"
port = 3000

[database]
path = "./data/newsniche.db"
pool_size = 10

[content]
posts_per_page = 10
max_page_size = 100
max_title_length = 200
min_content_length = 100
max_excerpt_length = 300

[search]
min_term_length = 2

[auth]
session_lifetime_days = 7
"#,
        site_name.replace('"', "\\\"")
    );

    std::fs::write(&config_path, config)?;

    tracing::info!("Created new site at {:?}", path);
    tracing::info!("Run 'newsniche migrate' to set up the database");
    tracing::info!("Run 'newsniche serve' to start the server");

    Ok(())
}
