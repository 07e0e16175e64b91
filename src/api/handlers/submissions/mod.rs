//! Public form intake and the staff inbox.
//!
//! Anyone may post a form; everything else needs a staff token. Inbox reads
//! and replies are open to Admin and Inbox roles, destructive operations and
//! the export to Admin only.
//!
//! Flow Overview:
//! 1) `intake` validates the multipart form per submission type, writes
//!    attachments to the private root, and stores rows in one transaction.
//! 2) Staff are notified by email, best-effort.
//! 3) `inbox` lists, reads, replies to, and moves submissions through the
//!    status table in `status`; `export` renders the filtered list as CSV.
//!
//! `storage` owns the SQL; handler modules parse input and map outcomes.

pub(crate) mod export;
mod files;
mod filters;
pub(crate) mod inbox;
pub(crate) mod intake;
mod notify;
mod rejection;
mod status;
mod storage;
pub(crate) mod types;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

pub use export::ExportLimit;
pub use files::StoragePaths;
pub use notify::NotificationRecipients;

pub(crate) use files::{random_hex, safe_extension};

#[derive(Debug)]
pub enum SubmissionError {
    BadRequest(&'static str),
    NotFound,
    Conflict(&'static str),
    EmailDelivery(String),
    Database(sqlx::Error),
    Io(std::io::Error),
}

impl From<sqlx::Error> for SubmissionError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

impl From<std::io::Error> for SubmissionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
            Self::EmailDelivery(detail) => (
                StatusCode::BAD_GATEWAY,
                format!("Failed to send email: {detail}"),
            )
                .into_response(),
            Self::Database(err) => {
                error!("Database error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::Io(err) => {
                error!("Attachment storage error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
