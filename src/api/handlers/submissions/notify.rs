//! Staff notification for new submissions.
//!
//! Best-effort: delivery failures are logged and never reach the submitter.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;
use tracing::{debug, warn};

use super::types::{SubmissionStatus, SubmissionType};
use crate::api::email::{EmailMessage, EmailSender};

/// Configured addresses, already trimmed; empty means unset.
#[derive(Clone, Debug, Default)]
pub struct NotificationRecipients {
    pub shared_inbox: String,
    pub publishing: String,
    pub support: String,
    pub info: String,
    pub legal: String,
}

impl NotificationRecipients {
    /// Shared inbox first, then legal for sync requests, then the type's own
    /// address. Blanks are dropped and duplicates removed case-insensitively.
    #[must_use]
    pub fn resolve(&self, kind: SubmissionType) -> Vec<String> {
        let extra = match kind {
            SubmissionType::DemoUpload => &self.shared_inbox,
            SubmissionType::ArtistInformation
            | SubmissionType::SongwriterInformation
            | SubmissionType::SyncRequest => &self.publishing,
            SubmissionType::GeneralContactInquiry => &self.info,
            SubmissionType::SupportForm => &self.support,
        };

        let mut candidates = vec![&self.shared_inbox];
        if kind == SubmissionType::SyncRequest {
            candidates.push(&self.legal);
        }
        candidates.push(extra);

        let mut recipients: Vec<String> = Vec::new();
        for candidate in candidates {
            let candidate = candidate.trim();
            if candidate.is_empty()
                || recipients
                    .iter()
                    .any(|existing| existing.eq_ignore_ascii_case(candidate))
            {
                continue;
            }
            recipients.push(candidate.to_string());
        }
        recipients
    }
}

/// What the notification needs to know about a freshly stored submission.
pub struct NewSubmission<'a> {
    pub id: uuid::Uuid,
    pub kind: SubmissionType,
    pub domain: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub message: Option<&'a str>,
    pub uploaded_by: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub fields: &'a [(String, String)],
    /// `(file name, content type, size)`
    pub files: &'a [(String, String, i64)],
}

#[must_use]
pub fn subject(submission: &NewSubmission<'_>) -> String {
    let domain = if submission.domain.trim().is_empty() {
        "unknown-domain"
    } else {
        submission.domain
    };
    format!(
        "New {} submission [{domain}] ({})",
        submission.kind, submission.id
    )
}

#[must_use]
pub fn body(submission: &NewSubmission<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Reference ID: {}", submission.id);
    let _ = writeln!(out, "Type: {}", submission.kind);
    let _ = writeln!(out, "Status: {}", SubmissionStatus::Unread);
    let _ = writeln!(out, "Domain: {}", submission.domain);
    let _ = writeln!(out, "Name: {}", submission.name);
    let _ = writeln!(out, "Email: {}", submission.email);
    let _ = writeln!(out, "UploadedBy: {}", submission.uploaded_by.unwrap_or_default());
    let _ = writeln!(
        out,
        "CreatedAt (UTC): {}",
        submission
            .created_at
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
    );
    out.push('\n');

    if let Some(message) = submission.message.filter(|m| !m.trim().is_empty()) {
        let _ = writeln!(out, "Message:\n{message}\n");
    }

    if !submission.fields.is_empty() {
        out.push_str("Fields:\n");
        for (name, value) in submission.fields {
            let _ = writeln!(out, "{name}: {value}");
        }
        out.push('\n');
    }

    if !submission.files.is_empty() {
        out.push_str("Files:\n");
        for (name, content_type, size) in submission.files {
            let _ = writeln!(out, "{name} ({content_type}, {size} bytes)");
        }
        out.push('\n');
    }

    out.push_str("This is an automated notification.\n");
    out
}

/// Send one message per recipient; stops at the first failure.
pub async fn notify_staff(
    sender: &dyn EmailSender,
    recipients: &NotificationRecipients,
    submission: &NewSubmission<'_>,
) {
    let to = recipients.resolve(submission.kind);
    if to.is_empty() {
        debug!("No notification recipients for {} submission", submission.kind);
        return;
    }

    let subject = subject(submission);
    let body = body(submission);
    for recipient in to {
        let message = EmailMessage::new(recipient, subject.clone(), body.clone());
        if let Err(err) = sender.send(&message).await {
            warn!(
                submission_id = %submission.id,
                "Failed to send submission notification: {err:#}"
            );
            return;
        }
    }
}
