//! Schema bootstrap and the initial Admin account.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, Row};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::api::handlers::auth::{Role, password::hash_password};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Credentials for the Admin created (or re-enabled) at startup.
#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub username: String,
    pub password: SecretString,
}

/// Split a schema file into statements ending with `;`, dropping comment-only lines.
#[must_use]
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

/// Apply the embedded schema. Every statement is idempotent.
///
/// # Errors
/// Returns an error naming the first statement that fails.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    let span = info_span!("db.schema", db.system = "postgresql");
    async {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }
    .instrument(span)
    .await
}

/// Create the seed Admin, or re-activate and re-promote it when it exists.
///
/// The stored password is only set on creation.
///
/// # Errors
/// Returns an error if hashing or a query fails.
pub async fn seed_admin(pool: &PgPool, seed: &AdminSeed, iterations: u32) -> Result<()> {
    let username = seed.username.trim();
    if username.is_empty() {
        return Ok(());
    }

    let existing = sqlx::query("SELECT id FROM users WHERE LOWER(email) = LOWER($1) LIMIT 1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to look up seed admin")?;

    if let Some(row) = existing {
        let id: Uuid = row.try_get("id")?;
        sqlx::query("UPDATE users SET is_active = TRUE, role = $2 WHERE id = $1")
            .bind(id)
            .bind(Role::Admin.as_str())
            .execute(pool)
            .await
            .context("Failed to re-activate seed admin")?;
        info!(%id, "Seed admin present");
        return Ok(());
    }

    let password = seed.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || {
        hash_password(password.expose_secret(), iterations)
    })
    .await
    .context("Password hashing task failed")?;

    let id = Uuid::new_v4();
    sqlx::query(
        r"
        INSERT INTO users (id, email, password_hash, role, is_active, created_at)
        VALUES ($1, $2, $3, $4, TRUE, NOW())
        ON CONFLICT (email) DO NOTHING
        ",
    )
    .bind(id)
    .bind(username)
    .bind(password_hash)
    .bind(Role::Admin.as_str())
    .execute(pool)
    .await
    .context("Failed to create seed admin")?;
    info!(%id, "Seed admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_splits_into_statements() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert!(statements.iter().all(|statement| statement.ends_with(';')));
        assert!(statements.iter().all(|statement| !statement.starts_with("--")));
        for table in [
            "users",
            "cms_entries",
            "submissions",
            "submission_fields",
            "submission_files",
            "submission_replies",
        ] {
            let create = format!("CREATE TABLE IF NOT EXISTS {table} (");
            assert!(
                statements.iter().any(|statement| statement.starts_with(&create)),
                "missing {table}"
            );
        }
    }

    #[test]
    fn split_keeps_multiline_statements_and_leftovers() {
        let sql = "-- header\nCREATE TABLE a (\n  id INT\n);\n\nSELECT 1";
        assert_eq!(
            split_sql_statements(sql),
            vec!["CREATE TABLE a (\n  id INT\n);".to_string(), "SELECT 1".to_string()]
        );
    }
}
