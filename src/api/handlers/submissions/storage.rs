//! SQL for submissions, fields, files, and replies.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    SubmissionError,
    filters::{Pagination, SubmissionFilters, push_conditions},
    rejection::{REJECTION_FIELD, rejection_body},
    status::{StatusOp, transition},
    types::{
        FieldView, FileView, ReplyView, SubmissionDetail, SubmissionListItem, SubmissionStatus,
        SubmissionSummary, SubmissionType,
    },
};

const SUMMARY_COLUMNS: &str =
    "s.id, s.type, s.status, s.domain, s.name, s.email, s.message, s.uploaded_by, s.created_at";

/// Submission row as written by intake.
pub struct NewSubmissionRow {
    pub id: Uuid,
    pub kind: SubmissionType,
    pub domain: String,
    pub name: String,
    pub email: String,
    pub message: Option<String>,
    pub uploaded_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewFileRow {
    pub id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub content_type: String,
    pub size: i64,
}

pub struct StoredFile {
    pub file_name: String,
    pub file_path: String,
    pub content_type: String,
}

fn decode_error(column: &str, code: i16) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unknown code {code}").into(),
    }
}

fn summary_from_row(row: &PgRow) -> Result<SubmissionSummary, sqlx::Error> {
    let kind: i16 = row.try_get("type")?;
    let status: i16 = row.try_get("status")?;
    Ok(SubmissionSummary {
        id: row.try_get("id")?,
        kind: SubmissionType::from_code(kind).ok_or_else(|| decode_error("type", kind))?,
        status: SubmissionStatus::from_code(status).ok_or_else(|| decode_error("status", status))?,
        domain: row.try_get("domain")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        message: row.try_get("message")?,
        uploaded_by: row.try_get("uploaded_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn reply_from_row(row: &PgRow) -> Result<ReplyView, sqlx::Error> {
    Ok(ReplyView {
        id: row.try_get("id")?,
        to_email: row.try_get("to_email")?,
        subject: row.try_get("subject")?,
        body: row.try_get("body")?,
        sent_at: row.try_get("sent_at")?,
        sent_by: row.try_get("sent_by")?,
    })
}

/// Insert the submission and its fields and files in one transaction.
pub async fn insert_submission(
    pool: &PgPool,
    submission: &NewSubmissionRow,
    fields: &[(String, String)],
    files: &[NewFileRow],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r"
        INSERT INTO submissions (id, type, status, domain, name, email, message, uploaded_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ",
    )
    .bind(submission.id)
    .bind(submission.kind.code())
    .bind(SubmissionStatus::Unread.code())
    .bind(&submission.domain)
    .bind(&submission.name)
    .bind(&submission.email)
    .bind(&submission.message)
    .bind(&submission.uploaded_by)
    .bind(submission.created_at)
    .execute(&mut *tx)
    .await?;

    for (name, value) in fields {
        sqlx::query(
            "INSERT INTO submission_fields (id, submission_id, name, value) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(submission.id)
        .bind(name)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }

    for file in files {
        sqlx::query(
            r"
            INSERT INTO submission_files (id, submission_id, file_name, file_path, content_type, size)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(file.id)
        .bind(submission.id)
        .bind(&file.file_name)
        .bind(&file.file_path)
        .bind(&file.content_type)
        .bind(file.size)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

async fn fields_for(
    pool: &PgPool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<FieldView>>, sqlx::Error> {
    let rows = sqlx::query(
        r"
        SELECT submission_id, name, value
        FROM submission_fields
        WHERE submission_id = ANY($1)
        ORDER BY name, id
        ",
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    let mut map: HashMap<Uuid, Vec<FieldView>> = HashMap::new();
    for row in rows {
        map.entry(row.try_get("submission_id")?)
            .or_default()
            .push(FieldView {
                name: row.try_get("name")?,
                value: row.try_get("value")?,
            });
    }
    Ok(map)
}

async fn files_for(
    pool: &PgPool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<FileView>>, sqlx::Error> {
    let rows = sqlx::query(
        r"
        SELECT id, submission_id, file_name, content_type, size
        FROM submission_files
        WHERE submission_id = ANY($1)
        ORDER BY file_name, id
        ",
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    let mut map: HashMap<Uuid, Vec<FileView>> = HashMap::new();
    for row in rows {
        map.entry(row.try_get("submission_id")?)
            .or_default()
            .push(FileView {
                id: row.try_get("id")?,
                file_name: row.try_get("file_name")?,
                content_type: row.try_get("content_type")?,
                size: row.try_get("size")?,
            });
    }
    Ok(map)
}

/// Filtered page, newest first, plus the total matching count.
pub async fn list_submissions(
    pool: &PgPool,
    filters: &SubmissionFilters,
    pagination: Pagination,
) -> Result<(i64, Vec<SubmissionListItem>), sqlx::Error> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM submissions s WHERE TRUE");
    push_conditions(&mut count, filters);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut page = QueryBuilder::<Postgres>::new(format!(
        "SELECT {SUMMARY_COLUMNS}, \
         (SELECT COUNT(*) FROM submission_replies r WHERE r.submission_id = s.id) AS replies_count \
         FROM submissions s WHERE TRUE"
    ));
    push_conditions(&mut page, filters);
    page.push(" ORDER BY s.created_at DESC, s.id LIMIT ")
        .push_bind(pagination.page_size)
        .push(" OFFSET ")
        .push_bind(pagination.offset());
    let rows = page.build().fetch_all(pool).await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in &rows {
        let replies_count: i64 = row.try_get("replies_count")?;
        summaries.push((summary_from_row(row)?, replies_count));
    }

    let ids: Vec<Uuid> = summaries.iter().map(|(summary, _)| summary.id).collect();
    let mut fields = fields_for(pool, &ids).await?;
    let mut files = files_for(pool, &ids).await?;

    let items = summaries
        .into_iter()
        .map(|(submission, replies_count)| SubmissionListItem {
            fields: fields.remove(&submission.id).unwrap_or_default(),
            files: files.remove(&submission.id).unwrap_or_default(),
            replies_count,
            submission,
        })
        .collect();

    Ok((total, items))
}

fn export_query(filters: &SubmissionFilters, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {SUMMARY_COLUMNS}, \
         EXISTS (SELECT 1 FROM submission_files f WHERE f.submission_id = s.id) AS has_files \
         FROM submissions s WHERE TRUE"
    ));
    push_conditions(&mut query, filters);
    query
        .push(" ORDER BY s.created_at DESC, s.id LIMIT ")
        .push_bind(limit);
    query
}

/// Filtered rows for CSV export, newest first, with a has-files flag.
pub async fn export_rows(
    pool: &PgPool,
    filters: &SubmissionFilters,
    limit: i64,
) -> Result<Vec<(SubmissionSummary, bool)>, sqlx::Error> {
    let mut query = export_query(filters, limit);
    let rows = query.build().fetch_all(pool).await?;
    rows.iter()
        .map(|row| -> Result<_, sqlx::Error> {
            Ok((summary_from_row(row)?, row.try_get("has_files")?))
        })
        .collect()
}

pub async fn fetch_summary(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<SubmissionSummary>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM submissions s WHERE s.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(summary_from_row).transpose()
}

pub async fn fetch_replies(pool: &PgPool, id: Uuid) -> Result<Vec<ReplyView>, sqlx::Error> {
    let rows = sqlx::query(
        r"
        SELECT id, to_email, subject, body, sent_at, sent_by
        FROM submission_replies
        WHERE submission_id = $1
        ORDER BY sent_at DESC, id
        ",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(reply_from_row).collect()
}

pub async fn fetch_detail(pool: &PgPool, id: Uuid) -> Result<Option<SubmissionDetail>, sqlx::Error> {
    let Some(submission) = fetch_summary(pool, id).await? else {
        return Ok(None);
    };
    let ids = [id];
    let fields = fields_for(pool, &ids).await?.remove(&id).unwrap_or_default();
    let files = files_for(pool, &ids).await?.remove(&id).unwrap_or_default();
    let replies = fetch_replies(pool, id).await?;
    Ok(Some(SubmissionDetail {
        submission,
        fields,
        files,
        replies,
    }))
}

pub async fn insert_reply(
    pool: &PgPool,
    submission_id: Uuid,
    to_email: &str,
    subject: &str,
    body: &str,
    sent_by: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        INSERT INTO submission_replies (id, submission_id, to_email, subject, body, sent_at, sent_by)
        VALUES ($1, $2, $3, $4, $5, NOW(), $6)
        ",
    )
    .bind(Uuid::new_v4())
    .bind(submission_id)
    .bind(to_email)
    .bind(subject)
    .bind(body)
    .bind(sent_by)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_file(
    pool: &PgPool,
    submission_id: Uuid,
    file_id: Uuid,
) -> Result<Option<StoredFile>, sqlx::Error> {
    let row = sqlx::query(
        r"
        SELECT file_name, file_path, content_type
        FROM submission_files
        WHERE id = $1 AND submission_id = $2
        ",
    )
    .bind(file_id)
    .bind(submission_id)
    .fetch_optional(pool)
    .await?;
    row.map(|row| -> Result<StoredFile, sqlx::Error> {
        Ok(StoredFile {
            file_name: row.try_get("file_name")?,
            file_path: row.try_get("file_path")?,
            content_type: row.try_get("content_type")?,
        })
    })
    .transpose()
}

/// Outcome of a status operation that passed the transition table.
pub enum StatusChange {
    Updated,
    Rejected { body: String },
}

/// Apply a status operation.
///
/// The update is conditional on the status read at the start; if another
/// request changed it meanwhile, nothing is written and `Conflict` is returned.
pub async fn change_status(
    pool: &PgPool,
    id: Uuid,
    op: StatusOp,
) -> Result<StatusChange, SubmissionError> {
    let current = fetch_summary(pool, id)
        .await?
        .ok_or(SubmissionError::NotFound)?;
    let next = transition(current.kind, current.status, op)
        .map_err(|err| SubmissionError::BadRequest(err.message()))?;

    let mut tx = pool.begin().await?;
    let updated = sqlx::query("UPDATE submissions SET status = $1 WHERE id = $2 AND status = $3")
        .bind(next.code())
        .bind(id)
        .bind(current.status.code())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if updated == 0 {
        tx.rollback().await?;
        return Err(SubmissionError::Conflict(
            "Submission status changed concurrently; reload and retry.",
        ));
    }

    let change = if op == StatusOp::Reject {
        let rows = sqlx::query("SELECT name, value FROM submission_fields WHERE submission_id = $1")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        let fields = rows
            .iter()
            .map(|row| -> Result<(String, String), sqlx::Error> {
                Ok((row.try_get("name")?, row.try_get("value")?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let body = rejection_body(&current.name, &fields);

        let replaced = sqlx::query(
            "UPDATE submission_fields SET value = $1 WHERE submission_id = $2 AND name = $3",
        )
        .bind(&body)
        .bind(id)
        .bind(REJECTION_FIELD)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if replaced == 0 {
            sqlx::query(
                "INSERT INTO submission_fields (id, submission_id, name, value) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(REJECTION_FIELD)
            .bind(&body)
            .execute(&mut *tx)
            .await?;
        }
        StatusChange::Rejected { body }
    } else {
        StatusChange::Updated
    };

    tx.commit().await?;
    Ok(change)
}

/// Delete a submission and everything hanging off it. Returns `false` when absent.
pub async fn delete_submission(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    for table in ["submission_replies", "submission_fields", "submission_files"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE submission_id = $1"))
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    let deleted = sqlx::query("DELETE FROM submissions WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if deleted == 0 {
        tx.rollback().await?;
        return Ok(false);
    }
    tx.commit().await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_limit_is_the_last_bind() {
        let filters = SubmissionFilters {
            status: Some(SubmissionStatus::Done),
            has_file: Some(true),
            ..SubmissionFilters::default()
        };
        let query = export_query(&filters, 5000);
        let sql = query.sql();
        assert!(sql.contains("s.status = $1"), "{sql}");
        assert!(sql.ends_with("ORDER BY s.created_at DESC, s.id LIMIT $2"), "{sql}");

        let unfiltered = export_query(&SubmissionFilters::default(), 3);
        assert!(unfiltered.sql().ends_with("LIMIT $1"));
    }
}
