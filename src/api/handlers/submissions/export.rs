//! CSV export of the filtered inbox.

use axum::{
    extract::{Extension, Query},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use sqlx::PgPool;
use std::sync::Arc;

use super::{
    SubmissionError, filters::SubmissionQuery, storage::export_rows, types::SubmissionSummary,
};
use crate::api::handlers::auth::{AuthState, Permission, principal::require_permission};

pub const EXPORT_LIMIT: i64 = 5000;

/// Most rows a single export returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportLimit(pub i64);

impl Default for ExportLimit {
    fn default() -> Self {
        Self(EXPORT_LIMIT)
    }
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const HEADER: [&str; 10] = [
    "Id",
    "Name",
    "Email",
    "Type",
    "Status",
    "Domain",
    "UploadedBy",
    "HasFiles",
    "Message",
    "CreatedAt",
];

/// Render rows as BOM-prefixed CSV with every value quoted.
///
/// # Errors
/// Returns an error if the CSV writer fails.
pub fn render_csv(rows: &[(SubmissionSummary, bool)]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(UTF8_BOM.to_vec());

    writer.write_record(HEADER)?;
    for (submission, has_files) in rows {
        writer.write_record([
            submission.id.to_string().as_str(),
            submission.name.as_str(),
            submission.email.as_str(),
            submission.kind.as_str(),
            submission.status.as_str(),
            submission.domain.as_str(),
            submission.uploaded_by.as_deref().unwrap_or_default(),
            if *has_files { "yes" } else { "no" },
            submission.message.as_deref().unwrap_or_default(),
            submission
                .created_at
                .to_rfc3339_opts(SecondsFormat::AutoSi, true)
                .as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

#[utoipa::path(
    get,
    path = "/api/submissions/export",
    params(SubmissionQuery),
    responses(
        (status = 200, description = "CSV attachment, newest first, at most 5000 rows.", body = String, content_type = "text/csv"),
        (status = 400, description = "Unparseable filter.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Admin only."),
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
/// Download the filtered inbox as CSV. Pagination parameters are ignored.
pub async fn export(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Extension(ExportLimit(limit)): Extension<ExportLimit>,
    Query(query): Query<SubmissionQuery>,
) -> Response {
    if let Err(status) = require_permission(&headers, &auth, Permission::InboxAdmin) {
        return status.into_response();
    }

    let filters = match query.filters() {
        Ok(filters) => filters,
        Err(message) => return SubmissionError::BadRequest(message).into_response(),
    };

    let rows = match export_rows(&pool, &filters, limit).await {
        Ok(rows) => rows,
        Err(err) => return SubmissionError::Database(err).into_response(),
    };

    let body = match render_csv(&rows) {
        Ok(body) => body,
        Err(err) => {
            return SubmissionError::Io(std::io::Error::other(err)).into_response();
        }
    };

    let file_name = format!("submissions_{}.csv", Utc::now().format("%Y%m%d%H%M"));
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
