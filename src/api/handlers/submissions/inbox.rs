//! Staff inbox: list, detail, status, reply, download, delete, accept, reject.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    SubmissionError,
    files::StoragePaths,
    filters::SubmissionQuery,
    status::StatusOp,
    storage::{
        StatusChange, change_status, delete_submission, fetch_detail, fetch_file, fetch_replies,
        fetch_summary, insert_reply, list_submissions,
    },
    types::{
        RejectResponse, RepliesResponse, ReplyRequest, SubmissionDetail, SubmissionListResponse,
        UpdateStatusRequest,
    },
};
use crate::api::{
    email::{EmailMessage, EmailSender},
    handlers::auth::{AuthState, Permission, principal::require_permission},
};

macro_rules! authorize {
    ($headers:expr, $auth:expr, $permission:expr) => {
        match require_permission(&$headers, &$auth, $permission) {
            Ok(principal) => principal,
            Err(status) => return status.into_response(),
        }
    };
}

#[utoipa::path(
    get,
    path = "/api/submissions",
    params(SubmissionQuery),
    responses(
        (status = 200, description = "Filtered page, newest first.", body = SubmissionListResponse),
        (status = 400, description = "Unparseable filter.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Role lacks inbox access."),
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
/// List submissions with filters and pagination.
pub async fn list(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Query(query): Query<SubmissionQuery>,
) -> Response {
    authorize!(headers, auth, Permission::InboxRead);

    let filters = match query.filters() {
        Ok(filters) => filters,
        Err(message) => return SubmissionError::BadRequest(message).into_response(),
    };
    let pagination = match query.pagination() {
        Ok(pagination) => pagination,
        Err(message) => return SubmissionError::BadRequest(message).into_response(),
    };

    match list_submissions(&pool, &filters, pagination).await {
        Ok((total, items)) => Json(SubmissionListResponse {
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            items,
        })
        .into_response(),
        Err(err) => SubmissionError::Database(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/submissions/{id}",
    params(("id" = Uuid, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Submission with fields, files, and replies.", body = SubmissionDetail),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Role lacks inbox access."),
        (status = 404, description = "Submission not found."),
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
pub async fn detail(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Response {
    authorize!(headers, auth, Permission::InboxRead);

    match fetch_detail(&pool, id).await {
        Ok(Some(detail)) => Json(detail).into_response(),
        Ok(None) => SubmissionError::NotFound.into_response(),
        Err(err) => SubmissionError::Database(err).into_response(),
    }
}

fn status_response(result: Result<StatusChange, SubmissionError>) -> Response {
    match result {
        Ok(StatusChange::Updated) => StatusCode::OK.into_response(),
        Ok(StatusChange::Rejected { body }) => Json(RejectResponse { body }).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/submissions/{id}/status",
    params(("id" = Uuid, Path, description = "Submission id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated."),
        (status = 400, description = "Target not settable, or submission locked.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Role lacks inbox access."),
        (status = 404, description = "Submission not found."),
        (status = 409, description = "Status changed concurrently.", body = String),
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
/// Move an open submission to Unread, Read, InProgress, or Done.
pub async fn update_status(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Json(request): Json<UpdateStatusRequest>,
) -> Response {
    authorize!(headers, auth, Permission::InboxRead);
    status_response(change_status(&pool, id, StatusOp::Set(request.status)).await)
}

#[utoipa::path(
    put,
    path = "/api/submissions/{id}/accept",
    params(("id" = Uuid, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Demo accepted."),
        (status = 400, description = "Not a demo upload, or already decided.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Admin only."),
        (status = 404, description = "Submission not found."),
        (status = 409, description = "Status changed concurrently.", body = String),
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
pub async fn accept(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Response {
    authorize!(headers, auth, Permission::InboxAdmin);
    status_response(change_status(&pool, id, StatusOp::Accept).await)
}

#[utoipa::path(
    put,
    path = "/api/submissions/{id}/reject",
    params(("id" = Uuid, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Demo rejected; the generated letter is returned, not sent.", body = RejectResponse),
        (status = 400, description = "Not a demo upload, or already decided.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Admin only."),
        (status = 404, description = "Submission not found."),
        (status = 409, description = "Status changed concurrently.", body = String),
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
/// Reject a demo and store a rejection letter as the `autoRejectionBody` field.
pub async fn reject(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Response {
    authorize!(headers, auth, Permission::InboxAdmin);
    status_response(change_status(&pool, id, StatusOp::Reject).await)
}

#[utoipa::path(
    post,
    path = "/api/submissions/{id}/reply",
    params(("id" = Uuid, Path, description = "Submission id")),
    request_body = ReplyRequest,
    responses(
        (status = 200, description = "Reply sent and recorded; all replies, newest first.", body = RepliesResponse),
        (status = 400, description = "Missing recipient, subject, or body.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Role lacks inbox access."),
        (status = 404, description = "Submission not found."),
        (status = 502, description = "Email delivery failed; nothing recorded.", body = String),
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
/// Email the submitter (or anyone) and record the reply.
///
/// The send happens first; a failed send records nothing.
pub async fn reply(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    email: Extension<Arc<dyn EmailSender>>,
    Json(request): Json<ReplyRequest>,
) -> Response {
    let principal = authorize!(headers, auth, Permission::InboxRead);

    let to_email = request.to_email.trim();
    let subject = request.subject.trim();
    let body = request.body.trim();
    if to_email.is_empty() || subject.is_empty() || body.is_empty() {
        return SubmissionError::BadRequest("ToEmail, Subject and Body are required.")
            .into_response();
    }

    match fetch_summary(&pool, id).await {
        Ok(Some(_)) => {}
        Ok(None) => return SubmissionError::NotFound.into_response(),
        Err(err) => return SubmissionError::Database(err).into_response(),
    }

    let message = EmailMessage::new(to_email, subject, body);
    if let Err(err) = email.send(&message).await {
        warn!(submission_id = %id, "Reply delivery failed: {err:#}");
        return SubmissionError::EmailDelivery(format!("{err:#}")).into_response();
    }

    let sent_by = match principal.email.trim() {
        "" => "unknown",
        address => address,
    };
    if let Err(err) = insert_reply(&pool, id, to_email, subject, body, sent_by).await {
        return SubmissionError::Database(err).into_response();
    }
    info!(submission_id = %id, sent_by, "Reply sent");

    match fetch_replies(&pool, id).await {
        Ok(replies) => Json(RepliesResponse { replies }).into_response(),
        Err(err) => SubmissionError::Database(err).into_response(),
    }
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|ch| {
            if ch.is_ascii() && !ch.is_ascii_control() && ch != '"' && ch != '\\' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let encoded: String = file_name
        .bytes()
        .map(|byte| {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
                char::from(byte).to_string()
            } else {
                format!("%{byte:02X}")
            }
        })
        .collect();
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[utoipa::path(
    get,
    path = "/api/submissions/{id}/files/{file_id}/download",
    params(
        ("id" = Uuid, Path, description = "Submission id"),
        ("file_id" = Uuid, Path, description = "File id"),
    ),
    responses(
        (status = 200, description = "File bytes with the stored content type."),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Role lacks inbox access."),
        (status = 404, description = "No such file on this submission, or missing on disk."),
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
pub async fn download(
    Path((id, file_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    storage: Extension<Arc<StoragePaths>>,
) -> Response {
    authorize!(headers, auth, Permission::InboxRead);

    let file = match fetch_file(&pool, id, file_id).await {
        Ok(Some(file)) => file,
        Ok(None) => return SubmissionError::NotFound.into_response(),
        Err(err) => return SubmissionError::Database(err).into_response(),
    };

    let Some(path) = storage.resolve_private(&file.file_path) else {
        warn!(file_id = %file_id, "Refusing stored path outside the private root");
        return SubmissionError::NotFound.into_response();
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return SubmissionError::NotFound.into_response();
        }
        Err(err) => return SubmissionError::Io(err).into_response(),
    };

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&content_disposition(&file.file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        StatusCode::OK,
        [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)],
        bytes,
    )
        .into_response()
}

#[utoipa::path(
    delete,
    path = "/api/submissions/{id}",
    params(("id" = Uuid, Path, description = "Submission id")),
    responses(
        (status = 204, description = "Submission and attachments deleted."),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Admin only."),
        (status = 404, description = "Submission not found."),
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
/// Hard delete; attachment removal afterwards is best-effort.
pub async fn delete(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    storage: Extension<Arc<StoragePaths>>,
) -> Response {
    authorize!(headers, auth, Permission::InboxAdmin);

    match delete_submission(&pool, id).await {
        Ok(true) => {}
        Ok(false) => return SubmissionError::NotFound.into_response(),
        Err(err) => return SubmissionError::Database(err).into_response(),
    }

    if let Err(err) = storage.remove_submission_dir(id).await {
        warn!(submission_id = %id, "Failed to remove attachment directory: {err}");
    }
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::content_disposition;

    #[test]
    fn disposition_keeps_ascii_and_encodes_utf8() {
        assert_eq!(
            content_disposition("demo.mp3"),
            "attachment; filename=\"demo.mp3\"; filename*=UTF-8''demo.mp3"
        );
        assert_eq!(
            content_disposition("Jos\u{e9} \"live\".wav"),
            "attachment; filename=\"Jos_ _live_.wav\"; filename*=UTF-8''Jos%C3%A9%20%22live%22.wav"
        );
    }
}
