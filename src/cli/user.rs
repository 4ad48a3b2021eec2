use crate::models::UserRole;
use crate::{services::auth, Config, Database};
use anyhow::Result;
use std::path::Path;

use super::UserCommand;

fn prompt_new_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt)?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

pub async fn run(config_path: &Path, command: UserCommand) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database.path)?;
    db.migrate()?;
    let conn = db.get()?;

    match command {
        UserCommand::Add {
            name,
            email,
            role,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_new_password("Password: ")?,
            };
            let role: UserRole = role
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid role '{}' (admin, editor, user)", role))?;
            let user = auth::create_user(&conn, &name, &email, &password, role)?;
            tracing::info!("User '{}' created as {}", user.email, user.role);
        }
        UserCommand::List => {
            println!("{:<24} {:<32} {:<8} {:<6}", "NAME", "EMAIL", "ROLE", "ACTIVE");
            println!("{}", "-".repeat(72));
            for user in auth::list_users(&conn)? {
                println!(
                    "{:<24} {:<32} {:<8} {:<6}",
                    user.name,
                    user.email,
                    user.role.to_string(),
                    if user.is_active { "yes" } else { "no" }
                );
            }
        }
        UserCommand::Remove { email } => {
            if auth::delete_user_by_email(&conn, &email)? {
                tracing::info!("User '{}' removed", email);
            } else {
                tracing::warn!("User '{}' not found", email);
            }
        }
        UserCommand::Passwd { email } => {
            let password = prompt_new_password("New password: ")?;
            if auth::update_password(&conn, &email, &password)? {
                tracing::info!("Password updated for '{}'", email);
            } else {
                tracing::warn!("User '{}' not found", email);
            }
        }
    }

    Ok(())
}
