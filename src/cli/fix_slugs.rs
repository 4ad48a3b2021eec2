use crate::services::posts;
use crate::{Config, Database};
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database.path)?;
    db.migrate()?;
    let conn = db.get()?;

    let repairs = posts::fix_slugs(&conn, &config.content.post_rules())?;
    if repairs.is_empty() {
        println!("All post slugs are valid.");
        return Ok(());
    }

    for repair in &repairs {
        println!(
            "  {:<40} '{}' -> '{}'",
            repair.title, repair.old_slug, repair.new_slug
        );
    }
    println!("\nFixed {} post slug(s).", repairs.len());

    Ok(())
}
