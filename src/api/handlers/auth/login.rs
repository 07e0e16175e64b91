//! Password login.
//!
//! Flow Overview:
//! 1) Look up an active user by email (case-insensitive).
//! 2) Verify the PBKDF2 hash off the async runtime.
//! 3) Issue an HS256 bearer token.
//!
//! Unknown users, disabled users, unusable hashes, and wrong passwords all
//! return the same bare 401.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::{str::FromStr, sync::Arc};
use tracing::{debug, error};
use uuid::Uuid;

use super::{
    password::verify_password,
    principal::Role,
    state::AuthState,
    types::{LoginRequest, LoginResponse},
};

struct LoginRecord {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted.", body = LoginResponse),
        (status = 401, description = "Unknown user, disabled account, or wrong password."),
    ),
    tag = "auth"
)]
pub async fn login(
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let record = match fetch_active_user(&pool, username).await {
        Ok(Some(record)) => record,
        Ok(None) => return StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!("Failed to look up user for login: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let password = request.password;
    let stored = record.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await;
    match verified {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            debug!("Login refused for {}: {err}", record.id);
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Err(err) => {
            error!("Password verification task failed: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let Ok(role) = Role::from_str(&record.role) else {
        error!("User {} has unknown role {:?}", record.id, record.role);
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match auth.issue_token(record.id, &record.email, role, Utc::now().timestamp()) {
        Ok(token) => (
            StatusCode::OK,
            Json(LoginResponse {
                token,
                role: role.as_str().to_string(),
                email: record.email,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to sign staff token: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn fetch_active_user(pool: &PgPool, email: &str) -> Result<Option<LoginRecord>, sqlx::Error> {
    let query = r"
        SELECT id, email, password_hash, role
        FROM users
        WHERE is_active AND LOWER(email) = LOWER($1)
        ORDER BY created_at
        LIMIT 1
    ";
    let Some(row) = sqlx::query(query).bind(email).fetch_optional(pool).await? else {
        return Ok(None);
    };
    Ok(Some(LoginRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: row.try_get("role")?,
    }))
}
