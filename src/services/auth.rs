use crate::db::timestamp;
use crate::models::{Session, User, UserRole};
use crate::services::error::{invalid, ContentError};
use crate::services::posts::{parsed_at, uuid_at};
use anyhow::{bail, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use rusqlite::{Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_NAME_LENGTH: usize = 50;
const MAX_EMAIL_LENGTH: usize = 254;
const TOKEN_BYTE_LENGTH: usize = 32;

const USER_SELECT: &str = "SELECT id, name, email, password_hash, role, avatar, bio, is_active, last_login, created_at, updated_at FROM users";

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(invalid("Name cannot be empty"));
    }
    if name.trim().chars().count() > MAX_NAME_LENGTH {
        return Err(invalid(format!(
            "Name must be {} characters or less",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(invalid("Email cannot be empty"));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(invalid(format!(
            "Email must be {} characters or less",
            MAX_EMAIL_LENGTH
        )));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(invalid("Invalid email format")),
    }
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(invalid(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String> {
    validate_password(password)?;
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dW5rbm93bg$0000000000000000000000000000000000000000000";

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => {
            if let Ok(dummy) = PasswordHash::new(DUMMY_HASH) {
                let _ = Argon2::default().verify_password(password.as_bytes(), &dummy);
            }
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Random bearer token. Only its hash is stored.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTE_LENGTH];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: parsed_at(row, 4)?,
        avatar: row.get(5)?,
        bio: row.get(6)?,
        is_active: row.get(7)?,
        last_login: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn create_user(
    conn: &Connection,
    name: &str,
    email: &str,
    password: &str,
    role: UserRole,
) -> Result<User> {
    validate_name(name)?;
    let email = email.trim().to_lowercase();
    validate_email(&email)?;
    if get_user_by_email(conn, &email)?.is_some() {
        bail!(ContentError::Conflict(
            "An account with this email already exists".to_string()
        ));
    }
    let password_hash = hash_password(password)?;

    let id = Uuid::new_v4();
    let now = timestamp();
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        (
            id.to_string(),
            name.trim(),
            &email,
            &password_hash,
            role.to_string(),
            &now,
            &now,
        ),
    )?;
    tracing::info!("User registered: {} ({})", email, role);
    get_user(conn, id)?.ok_or_else(|| ContentError::NotFound("User not found").into())
}

/// Self-service signup. The very first account administers the site; every
/// later one starts as a plain user.
pub fn register(conn: &Connection, name: &str, email: &str, password: &str) -> Result<User> {
    let role = if has_users(conn)? {
        UserRole::User
    } else {
        UserRole::Admin
    };
    create_user(conn, name, email, password, role)
}

pub fn update_password(conn: &Connection, email: &str, password: &str) -> Result<bool> {
    let password_hash = hash_password(password)?;
    let affected = conn.execute(
        "UPDATE users SET password_hash = ?, updated_at = ? WHERE email = ?",
        (&password_hash, timestamp(), email.trim().to_lowercase()),
    )?;
    Ok(affected > 0)
}

/// Active user matching the credentials, if any.
pub fn authenticate(conn: &Connection, email: &str, password: &str) -> Result<Option<User>> {
    let user = get_user_by_email(conn, &email.trim().to_lowercase())?;
    match user {
        Some(u) if verify_password(password, &u.password_hash) && u.is_active => Ok(Some(u)),
        Some(_) => Ok(None),
        None => {
            verify_password(password, DUMMY_HASH);
            Ok(None)
        }
    }
}

pub fn create_session(conn: &Connection, user_id: Uuid, lifetime_days: i64) -> Result<String> {
    let token = generate_session_token();
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(lifetime_days))
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        (hash_token(&token), user_id.to_string(), &expires_at, timestamp()),
    )?;
    Ok(token)
}

/// Check credentials and open a session for them.
pub fn login(
    conn: &Connection,
    email: &str,
    password: &str,
    lifetime_days: i64,
) -> Result<Option<Session>> {
    let Some(mut user) = authenticate(conn, email, password)? else {
        return Ok(None);
    };
    let token = create_session(conn, user.id, lifetime_days)?;
    let now = timestamp();
    conn.execute(
        "UPDATE users SET last_login = ? WHERE id = ?",
        (&now, user.id.to_string()),
    )?;
    user.last_login = Some(now);
    Ok(Some(Session { user, token }))
}

pub fn validate_session(conn: &Connection, token: &str) -> Result<Option<Session>> {
    let sql = format!(
        "{} WHERE id = (SELECT user_id FROM sessions WHERE token_hash = ? AND expires_at > ?) AND is_active = 1",
        USER_SELECT
    );
    let user = conn
        .query_row(&sql, (hash_token(token), timestamp()), row_to_user)
        .optional()?;
    Ok(user.map(|user| Session {
        user,
        token: token.to_string(),
    }))
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?",
        [hash_token(token)],
    )?;
    Ok(())
}

pub fn cleanup_expired_sessions(conn: &Connection) -> Result<usize> {
    let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?", [timestamp()])?;
    Ok(removed)
}

pub fn has_users(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY created_at DESC", USER_SELECT))?;
    let users = stmt
        .query_map([], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn get_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("{} WHERE id = ?", USER_SELECT),
            [id.to_string()],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("{} WHERE email = ?", USER_SELECT),
            [email],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn delete_user_by_email(conn: &Connection, email: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM users WHERE email = ?",
        [email.trim().to_lowercase()],
    )?;
    Ok(affected > 0)
}
