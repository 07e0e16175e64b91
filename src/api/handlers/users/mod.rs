//! Staff account management (Admin only).
//!
//! Every write that can demote, disable, or delete an account runs the checks
//! in `guard` inside the same transaction as the write.

mod guard;
mod storage;
pub(crate) mod types;

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::{str::FromStr, sync::Arc};
use tracing::{error, info};
use uuid::Uuid;

use super::auth::{AuthState, Permission, Role, password::hash_password, principal::require_permission};
use storage::{UserUpdate, delete_user, insert_user, list_users, update_user};
use types::{
    CreateUserRequest, SetActiveRequest, SetRoleRequest, UpdateUserRequest, UserView, non_blank,
};

const FIELDS_REQUIRED: &str = "Email, password and role are required.";
const INVALID_ROLE: &str = "Role must be Admin, Editor, or Inbox.";

#[derive(Debug)]
pub enum UserError {
    BadRequest(&'static str),
    NotFound,
    Conflict(&'static str),
    Database(sqlx::Error),
    Hashing(tokio::task::JoinError),
}

impl From<sqlx::Error> for UserError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
            Self::Database(err) => {
                error!("Database error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::Hashing(err) => {
                error!("Password hashing task failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

macro_rules! authorize {
    ($headers:expr, $auth:expr) => {
        match require_permission(&$headers, &$auth, Permission::UserManagement) {
            Ok(principal) => principal,
            Err(status) => return status.into_response(),
        }
    };
}

fn parse_role(value: &str) -> Result<Role, UserError> {
    Role::from_str(value).map_err(|()| UserError::BadRequest(INVALID_ROLE))
}

/// PBKDF2 off the async runtime.
async fn hash(auth: &AuthState, password: String) -> Result<String, UserError> {
    let iterations = auth.config().password_iterations();
    tokio::task::spawn_blocking(move || hash_password(&password, iterations))
        .await
        .map_err(UserError::Hashing)
}

fn user_response(result: Result<UserView, UserError>) -> Response {
    match result {
        Ok(user) => Json(user).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All accounts, newest first.", body = [UserView]),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Admin only."),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Response {
    authorize!(headers, auth);
    match list_users(&pool).await {
        Ok(users) => Json(users).into_response(),
        Err(err) => UserError::Database(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Account created.", body = UserView),
        (status = 400, description = "Missing field or unknown role.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Admin only."),
        (status = 409, description = "Email already registered.", body = String),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn create(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Json(request): Json<CreateUserRequest>,
) -> Response {
    let principal = authorize!(headers, auth);

    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() || request.role.trim().is_empty() {
        return UserError::BadRequest(FIELDS_REQUIRED).into_response();
    }
    let role = match parse_role(&request.role) {
        Ok(role) => role,
        Err(err) => return err.into_response(),
    };

    let password_hash = match hash(&auth, request.password).await {
        Ok(hash) => hash,
        Err(err) => return err.into_response(),
    };
    let result = insert_user(
        &pool,
        email,
        &password_hash,
        role,
        request.is_active.unwrap_or(true),
    )
    .await;
    if let Ok(user) = &result {
        info!(user_id = %user.id, role = %role, by = %principal.email, "User created");
    }
    user_response(result)
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated account.", body = UserView),
        (status = 400, description = "Unknown role or guard rail.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Admin only."),
        (status = 404, description = "No such user."),
        (status = 409, description = "Email already in use.", body = String),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
/// Change any of email, password, role, and activity in one request.
pub async fn update(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Response {
    let principal = authorize!(headers, auth);

    let role = match non_blank(request.role.as_deref()).map(parse_role).transpose() {
        Ok(role) => role,
        Err(err) => return err.into_response(),
    };
    let password_hash = match request.password.filter(|password| !password.trim().is_empty()) {
        Some(password) => match hash(&auth, password).await {
            Ok(hash) => Some(hash),
            Err(err) => return err.into_response(),
        },
        None => None,
    };

    let update = UserUpdate {
        email: non_blank(request.email.as_deref()).map(str::to_string),
        password_hash,
        role,
        is_active: request.is_active,
    };
    let result = update_user(&pool, principal.user_id, id, update).await;
    if result.is_ok() {
        info!(user_id = %id, by = %principal.email, "User updated");
    }
    user_response(result)
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Updated account.", body = UserView),
        (status = 400, description = "Unknown role or guard rail.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Admin only."),
        (status = 404, description = "No such user."),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn set_role(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetRoleRequest>,
) -> Response {
    let principal = authorize!(headers, auth);
    let role = match parse_role(&request.role) {
        Ok(role) => role,
        Err(err) => return err.into_response(),
    };

    let update = UserUpdate {
        role: Some(role),
        ..UserUpdate::default()
    };
    let result = update_user(&pool, principal.user_id, id, update).await;
    if result.is_ok() {
        info!(user_id = %id, role = %role, by = %principal.email, "User role changed");
    }
    user_response(result)
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/active",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Updated account.", body = UserView),
        (status = 400, description = "Guard rail.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Admin only."),
        (status = 404, description = "No such user."),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn set_active(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetActiveRequest>,
) -> Response {
    let principal = authorize!(headers, auth);
    let update = UserUpdate {
        is_active: Some(request.is_active),
        ..UserUpdate::default()
    };
    let result = update_user(&pool, principal.user_id, id, update).await;
    if result.is_ok() {
        info!(user_id = %id, is_active = request.is_active, by = %principal.email, "User activity changed");
    }
    user_response(result)
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Deleted."),
        (status = 400, description = "Guard rail.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Admin only."),
        (status = 404, description = "No such user."),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn delete(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Path(id): Path<Uuid>,
) -> Response {
    let principal = authorize!(headers, auth);
    match delete_user(&pool, principal.user_id, id).await {
        Ok(()) => {
            info!(user_id = %id, by = %principal.email, "User deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => err.into_response(),
    }
}
