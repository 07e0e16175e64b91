//! Public submission form.
//!
//! Flow Overview:
//! 1) Read the multipart body (part names are case-insensitive).
//! 2) Validate per submission type; nothing is written for a rejected form.
//! 3) Write non-empty attachments under the private root.
//! 4) Insert the submission, fields, and files in one transaction; on failure
//!    remove the attachment directory.
//! 5) Notify staff (best-effort) and return the new id.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Multipart, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{SubsecRound, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    SubmissionError,
    files::{StoragePaths, relative_path, stored_file_name},
    notify::{NewSubmission, NotificationRecipients, notify_staff},
    storage::{NewFileRow, NewSubmissionRow, insert_submission},
    types::{SubmissionCreated, SubmissionType},
};
use crate::api::email::EmailSender;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const UPLOADED_BY_FIELD: &str = "uploadedBy";

/// Multipart layout of the public form (documentation only).
#[derive(ToSchema)]
#[schema(rename_all = "PascalCase")]
#[allow(dead_code)]
pub struct SubmissionForm {
    /// Type code or name; defaults to GeneralContactInquiry.
    #[schema(rename = "Type")]
    kind: Option<String>,
    domain: Option<String>,
    name: String,
    email: String,
    message: Option<String>,
    /// `Artist` or `Manager`; required for DemoUpload.
    uploaded_by: Option<String>,
    /// JSON object of string values.
    fields_json: Option<String>,
    #[schema(value_type = Vec<String>)]
    files: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Raw form values as received.
#[derive(Debug, Default, Clone)]
pub struct IntakeForm {
    pub kind: Option<String>,
    pub domain: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
    pub uploaded_by: Option<String>,
    pub fields_json: Option<String>,
    pub files: Vec<UploadedFile>,
}

/// A form that passed validation, trimmed and ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub kind: SubmissionType,
    pub domain: String,
    pub name: String,
    pub email: String,
    pub message: Option<String>,
    pub uploaded_by: Option<String>,
    /// Submitted fields with non-blank names, trimmed.
    pub fields: Vec<(String, String)>,
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Parse `FieldsJson`: an object whose values are strings (null reads as empty).
fn parse_fields_json(raw: Option<&String>) -> Result<Vec<(String, String)>, &'static str> {
    const MESSAGE: &str = "fieldsJson must be a JSON object.";
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    let serde_json::Value::Object(map) = serde_json::from_str(raw).map_err(|_| MESSAGE)? else {
        return Err(MESSAGE);
    };

    let mut fields = Vec::with_capacity(map.len());
    for (name, value) in map {
        let value = match value {
            serde_json::Value::String(value) => value,
            serde_json::Value::Null => String::new(),
            _ => return Err(MESSAGE),
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        fields.push((name.to_string(), value.trim().to_string()));
    }
    Ok(fields)
}

/// Apply the per-type intake rules in order.
///
/// # Errors
/// Returns the client-facing message for the first rule that fails.
pub fn validate(form: &IntakeForm) -> Result<ValidatedForm, &'static str> {
    let (Some(name), Some(email)) = (non_blank(form.name.as_ref()), non_blank(form.email.as_ref()))
    else {
        return Err("Name and Email are required.");
    };

    let kind = match non_blank(form.kind.as_ref()) {
        Some(raw) => raw.parse().map_err(|()| "Invalid submission type.")?,
        None => SubmissionType::GeneralContactInquiry,
    };

    let uploaded_by = non_blank(form.uploaded_by.as_ref());
    let files: Vec<&UploadedFile> = form.files.iter().filter(|f| !f.bytes.is_empty()).collect();

    match kind {
        SubmissionType::DemoUpload => {
            let Some(role) = uploaded_by.as_deref() else {
                return Err("UploadedBy is required for DemoUpload.");
            };
            if !role.eq_ignore_ascii_case("Artist") && !role.eq_ignore_ascii_case("Manager") {
                return Err("UploadedBy must be Artist or Manager.");
            }
            if files.is_empty() {
                return Err("At least one file is required for DemoUpload.");
            }
        }
        SubmissionType::SongwriterInformation => {
            let [photo] = files.as_slice() else {
                return Err(if files.is_empty() {
                    "Photo is required for SongwriterInformation."
                } else {
                    "Only one photo is allowed for SongwriterInformation."
                });
            };
            let content_type = photo.content_type.as_deref().unwrap_or_default();
            if !content_type.to_ascii_lowercase().starts_with("image/") {
                return Err("Photo must be an image file.");
            }
        }
        _ => {}
    }

    let fields = parse_fields_json(form.fields_json.as_ref())?;

    Ok(ValidatedForm {
        kind,
        domain: form.domain.as_deref().map(str::trim).unwrap_or_default().to_string(),
        name,
        email,
        message: non_blank(form.message.as_ref()),
        uploaded_by,
        fields,
    })
}

async fn read_form(mut multipart: Multipart) -> Result<IntakeForm, MultipartError> {
    let mut form = IntakeForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_ascii_lowercase();
        if name == "files" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            form.files.push(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
            continue;
        }

        let slot = match name.as_str() {
            "type" => &mut form.kind,
            "domain" => &mut form.domain,
            "name" => &mut form.name,
            "email" => &mut form.email,
            "message" => &mut form.message,
            "uploadedby" => &mut form.uploaded_by,
            "fieldsjson" => &mut form.fields_json,
            _ => continue,
        };
        *slot = Some(field.text().await?);
    }
    Ok(form)
}

/// Write attachments; returns the rows to insert.
async fn store_files(
    storage: &StoragePaths,
    id: Uuid,
    files: &[UploadedFile],
) -> Result<Vec<NewFileRow>, std::io::Error> {
    let files: Vec<&UploadedFile> = files.iter().filter(|f| !f.bytes.is_empty()).collect();
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let dir = storage.submission_dir(id);
    tokio::fs::create_dir_all(&dir).await?;

    let mut rows = Vec::with_capacity(files.len());
    for file in files {
        let stored = stored_file_name(&file.file_name);
        tokio::fs::write(dir.join(&stored), &file.bytes).await?;
        rows.push(NewFileRow {
            id: Uuid::new_v4(),
            file_name: file.file_name.clone(),
            file_path: relative_path(id, &stored),
            content_type: file
                .content_type
                .clone()
                .filter(|ct| !ct.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            size: i64::try_from(file.bytes.len()).unwrap_or(i64::MAX),
        });
    }
    Ok(rows)
}

async fn cleanup(storage: &StoragePaths, id: Uuid) {
    if let Err(err) = storage.remove_submission_dir(id).await {
        warn!(submission_id = %id, "Failed to remove attachments after aborted intake: {err}");
    }
}

#[utoipa::path(
    post,
    path = "/api/submissions/form",
    request_body(content = SubmissionForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Submission stored.", body = SubmissionCreated),
        (status = 400, description = "Validation failed.", body = String),
        (status = 413, description = "Body larger than 20 MiB."),
    ),
    tag = "submissions"
)]
/// Accept a public form submission with optional attachments.
pub async fn create_form(
    pool: Extension<PgPool>,
    storage: Extension<Arc<StoragePaths>>,
    email: Extension<Arc<dyn EmailSender>>,
    recipients: Extension<Arc<NotificationRecipients>>,
    multipart: Multipart,
) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(err) => return (err.status(), err.body_text()).into_response(),
    };

    let validated = match validate(&form) {
        Ok(validated) => validated,
        Err(message) => return SubmissionError::BadRequest(message).into_response(),
    };

    let id = Uuid::new_v4();
    let created_at = Utc::now().trunc_subsecs(6);

    let files = match store_files(&storage, id, &form.files).await {
        Ok(files) => files,
        Err(err) => {
            cleanup(&storage, id).await;
            return SubmissionError::Io(err).into_response();
        }
    };

    let mut fields = validated.fields.clone();
    if let Some(uploaded_by) = &validated.uploaded_by {
        fields.push((UPLOADED_BY_FIELD.to_string(), uploaded_by.clone()));
    }

    let row = NewSubmissionRow {
        id,
        kind: validated.kind,
        domain: validated.domain.clone(),
        name: validated.name.clone(),
        email: validated.email.clone(),
        message: validated.message.clone(),
        uploaded_by: validated.uploaded_by.clone(),
        created_at,
    };
    if let Err(err) = insert_submission(&pool, &row, &fields, &files).await {
        cleanup(&storage, id).await;
        return SubmissionError::Database(err).into_response();
    }

    info!(submission_id = %id, kind = %validated.kind, files = files.len(), "Submission stored");

    let file_summary: Vec<(String, String, i64)> = files
        .iter()
        .map(|f| (f.file_name.clone(), f.content_type.clone(), f.size))
        .collect();
    let notification = NewSubmission {
        id,
        kind: validated.kind,
        domain: &validated.domain,
        name: &validated.name,
        email: &validated.email,
        message: validated.message.as_deref(),
        uploaded_by: validated.uploaded_by.as_deref(),
        created_at,
        fields: &validated.fields,
        files: &file_summary,
    };
    notify_staff(email.0.as_ref(), &recipients, &notification).await;

    (StatusCode::OK, Json(SubmissionCreated { id })).into_response()
}
