//! CMS documents addressed by `(siteKey, key)`.
//!
//! Reads are public; writes need the Admin or Editor role. Documents are opaque
//! JSON text: `upsert` stores whatever it is given and only `content` parses it.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::auth::{AuthState, Permission, principal::require_permission};

const KEYS_REQUIRED: &str = "siteKey and key are required.";

#[derive(Deserialize, IntoParams, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CmsQuery {
    pub site_key: String,
    pub key: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CmsEntry {
    pub site_key: String,
    pub key: String,
    /// Stored document text.
    pub json: String,
    pub updated_at_utc: DateTime<Utc>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CmsUpsertRequest {
    pub site_key: String,
    pub key: String,
    /// Document text; `{}` when omitted.
    pub json: Option<String>,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct ContentQuery {
    /// Tried as a `key.<locale>` suffix before the bare key.
    pub locale: Option<String>,
}

#[derive(Debug)]
enum CmsError {
    BadRequest(&'static str),
    NotFound,
    InvalidStoredJson,
    Database(sqlx::Error),
}

impl IntoResponse for CmsError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::InvalidStoredJson => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Stored content JSON is invalid.",
            )
                .into_response(),
            Self::Database(err) => {
                error!("Database error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

async fn fetch_entry(
    pool: &PgPool,
    site_key: &str,
    key: &str,
) -> Result<Option<CmsEntry>, sqlx::Error> {
    let row = sqlx::query(
        r"
        SELECT site_key, key, json, updated_at_utc
        FROM cms_entries
        WHERE site_key = $1 AND key = $2
        ",
    )
    .bind(site_key)
    .bind(key)
    .fetch_optional(pool)
    .await?;

    row.map(|row| -> Result<CmsEntry, sqlx::Error> {
        Ok(CmsEntry {
            site_key: row.try_get("site_key")?,
            key: row.try_get("key")?,
            json: row.try_get("json")?,
            updated_at_utc: row.try_get("updated_at_utc")?,
        })
    })
    .transpose()
}

/// Insert or replace a document, stamping the current time.
///
/// # Errors
/// Returns the database error.
pub async fn upsert_entry(
    pool: &PgPool,
    site_key: &str,
    key: &str,
    json: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        INSERT INTO cms_entries (id, site_key, key, json, updated_at_utc)
        VALUES ($1, $2, $3, $4, NOW())
        ON CONFLICT (site_key, key)
        DO UPDATE SET json = EXCLUDED.json, updated_at_utc = EXCLUDED.updated_at_utc
        ",
    )
    .bind(Uuid::new_v4())
    .bind(site_key)
    .bind(key)
    .bind(json)
    .execute(pool)
    .await?;
    Ok(())
}

/// Split `siteKey.key` at the first dot.
fn split_full_key(full_key: &str) -> Option<(&str, &str)> {
    if full_key.trim().is_empty() {
        return None;
    }
    full_key.split_once('.')
}

/// Keys to try in order: the localized key first when a locale is given.
fn candidate_keys(key: &str, locale: Option<&str>) -> Vec<String> {
    let locale = locale
        .map(|locale| locale.trim().to_lowercase())
        .filter(|locale| !locale.is_empty());
    match locale {
        Some(locale) => vec![format!("{key}.{locale}"), key.to_string()],
        None => vec![key.to_string()],
    }
}

#[utoipa::path(
    get,
    path = "/api/cms",
    params(CmsQuery),
    responses(
        (status = 200, description = "Stored document.", body = CmsEntry),
        (status = 400, description = "siteKey or key missing.", body = String),
        (status = 404, description = "No such document."),
    ),
    tag = "cms"
)]
pub async fn get_entry(pool: Extension<PgPool>, Query(query): Query<CmsQuery>) -> Response {
    if query.site_key.trim().is_empty() || query.key.trim().is_empty() {
        return CmsError::BadRequest(KEYS_REQUIRED).into_response();
    }

    match fetch_entry(&pool, &query.site_key, &query.key).await {
        Ok(Some(entry)) => Json(entry).into_response(),
        Ok(None) => CmsError::NotFound.into_response(),
        Err(err) => CmsError::Database(err).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/cms",
    request_body = CmsUpsertRequest,
    responses(
        (status = 200, description = "Document stored."),
        (status = 400, description = "siteKey or key missing.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Role cannot edit content."),
    ),
    security(("bearer" = [])),
    tag = "cms"
)]
/// Create or replace a document. The payload is stored without validation.
pub async fn upsert(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Json(request): Json<CmsUpsertRequest>,
) -> Response {
    let principal = match require_permission(&headers, &auth, Permission::CmsWrite) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    if request.site_key.trim().is_empty() || request.key.trim().is_empty() {
        return CmsError::BadRequest(KEYS_REQUIRED).into_response();
    }

    let json = request.json.as_deref().unwrap_or("{}");
    match upsert_entry(&pool, &request.site_key, &request.key, json).await {
        Ok(()) => {
            info!(
                site_key = %request.site_key,
                key = %request.key,
                editor = %principal.email,
                "CMS entry saved"
            );
            StatusCode::OK.into_response()
        }
        Err(err) => CmsError::Database(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/content/{full_key}",
    params(
        ("full_key" = String, Path, description = "`siteKey.key`, split at the first dot"),
        ContentQuery,
    ),
    responses(
        (status = 200, description = "The stored document as JSON.", body = serde_json::Value),
        (status = 400, description = "fullKey has no dot.", body = String),
        (status = 404, description = "Neither the localized nor the bare key exists."),
        (status = 500, description = "Stored text is not valid JSON.", body = String),
    ),
    tag = "cms"
)]
/// Resolve a document for the public site, preferring the localized key.
pub async fn content(
    Path(full_key): Path<String>,
    pool: Extension<PgPool>,
    Query(query): Query<ContentQuery>,
) -> Response {
    let Some((site_key, key)) = split_full_key(&full_key) else {
        return CmsError::BadRequest("fullKey must be like siteKey.key").into_response();
    };

    for candidate in candidate_keys(key, query.locale.as_deref()) {
        match fetch_entry(&pool, site_key, &candidate).await {
            Ok(Some(entry)) => {
                return match serde_json::from_str::<serde_json::Value>(&entry.json) {
                    Ok(document) => Json(document).into_response(),
                    Err(err) => {
                        error!(site_key, key = %candidate, "Stored content JSON is invalid: {err}");
                        CmsError::InvalidStoredJson.into_response()
                    }
                };
            }
            Ok(None) => {}
            Err(err) => return CmsError::Database(err).into_response(),
        }
    }
    CmsError::NotFound.into_response()
}
