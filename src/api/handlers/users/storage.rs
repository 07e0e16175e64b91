//! SQL for staff accounts.

use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use std::str::FromStr;
use uuid::Uuid;

use super::{
    UserError,
    guard::{self, Change, Target},
    types::UserView,
};
use crate::api::handlers::auth::Role;

const USER_EXISTS: &str = "User already exists.";
const EMAIL_IN_USE: &str = "Email already in use.";

/// Fields to write; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

fn user_view(row: &PgRow) -> Result<UserView, sqlx::Error> {
    Ok(UserView {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        role: row.try_get("role")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn unique_violation(err: sqlx::Error, message: &'static str) -> UserError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => UserError::Conflict(message),
        _ => UserError::Database(err),
    }
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<UserView>, sqlx::Error> {
    let rows = sqlx::query(
        r"
        SELECT id, email, role, is_active, created_at
        FROM users
        ORDER BY created_at DESC
        ",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(user_view).collect()
}

async fn email_taken(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
    except: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    let taken: bool = sqlx::query_scalar(
        r"
        SELECT EXISTS (
            SELECT 1 FROM users
            WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
        )
        ",
    )
    .bind(email)
    .bind(except)
    .fetch_one(&mut **tx)
    .await?;
    Ok(taken)
}

/// Insert an account unless the email is taken, ignoring case.
pub async fn insert_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    role: Role,
    is_active: bool,
) -> Result<UserView, UserError> {
    let mut tx = pool.begin().await?;
    if email_taken(&mut tx, email, None).await? {
        return Err(UserError::Conflict(USER_EXISTS));
    }

    let row = sqlx::query(
        r"
        INSERT INTO users (id, email, password_hash, role, is_active, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        RETURNING id, email, role, is_active, created_at
        ",
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(is_active)
    .fetch_one(&mut *tx)
    .await
    .map_err(|err| unique_violation(err, USER_EXISTS))?;

    let user = user_view(&row)?;
    tx.commit().await?;
    Ok(user)
}

/// Lock the target and every active Admin in id order.
///
/// Returns the target, or `None` when it does not exist, plus how many other
/// active Admins remain.
async fn lock_target(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<(Target, usize)>, sqlx::Error> {
    let rows = sqlx::query(
        r"
        SELECT id, role, is_active
        FROM users
        WHERE id = $1 OR (role = 'Admin' AND is_active)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(id)
    .fetch_all(&mut **tx)
    .await?;

    let mut target = None;
    let mut other_active_admins = 0;
    for row in &rows {
        let row_id: Uuid = row.try_get("id")?;
        let role: String = row.try_get("role")?;
        let role = Role::from_str(&role).ok();
        let is_active: bool = row.try_get("is_active")?;
        if row_id == id {
            target = Some(Target {
                id: row_id,
                role,
                is_active,
            });
        } else if is_active && role == Some(Role::Admin) {
            other_active_admins += 1;
        }
    }
    Ok(target.map(|target| (target, other_active_admins)))
}

/// Apply a partial update after the email and guard checks.
pub async fn update_user(
    pool: &PgPool,
    actor: Uuid,
    id: Uuid,
    update: UserUpdate,
) -> Result<UserView, UserError> {
    let mut tx = pool.begin().await?;
    let Some((target, other_active_admins)) = lock_target(&mut tx, id).await? else {
        return Err(UserError::NotFound);
    };

    if let Some(email) = update.email.as_deref() {
        if email_taken(&mut tx, email, Some(id)).await? {
            return Err(UserError::Conflict(EMAIL_IN_USE));
        }
    }

    let change = Change {
        role: update.role,
        is_active: update.is_active,
    };
    guard::check_update(actor, &target, change, other_active_admins)
        .map_err(UserError::BadRequest)?;

    let row = sqlx::query(
        r"
        UPDATE users
        SET email = COALESCE($2, email),
            password_hash = COALESCE($3, password_hash),
            role = COALESCE($4, role),
            is_active = COALESCE($5, is_active)
        WHERE id = $1
        RETURNING id, email, role, is_active, created_at
        ",
    )
    .bind(id)
    .bind(update.email)
    .bind(update.password_hash)
    .bind(update.role.map(Role::as_str))
    .bind(update.is_active)
    .fetch_one(&mut *tx)
    .await
    .map_err(|err| unique_violation(err, EMAIL_IN_USE))?;

    let user = user_view(&row)?;
    tx.commit().await?;
    Ok(user)
}

pub async fn delete_user(pool: &PgPool, actor: Uuid, id: Uuid) -> Result<(), UserError> {
    let mut tx = pool.begin().await?;
    let Some((target, other_active_admins)) = lock_target(&mut tx, id).await? else {
        return Err(UserError::NotFound);
    };
    guard::check_delete(actor, &target, other_active_admins).map_err(UserError::BadRequest)?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
