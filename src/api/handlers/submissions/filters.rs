//! Inbox list/export filters and pagination.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use utoipa::IntoParams;

use super::types::{SubmissionStatus, SubmissionType};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// Raw query string; every value is optional and parsed leniently.
#[derive(Deserialize, IntoParams, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SubmissionQuery {
    /// Case-insensitive substring over name, email, domain, message, id, and fields.
    pub search: Option<String>,
    /// Status code or name.
    pub status: Option<String>,
    /// Type code or name.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    pub from: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (whole day, inclusive).
    pub to: Option<String>,
    pub has_file: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubmissionFilters {
    pub status: Option<SubmissionStatus>,
    pub kind: Option<SubmissionType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub has_file: Option<bool>,
    /// Lowercased, trimmed; `None` when blank.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Pagination {
    #[must_use]
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.filter(|page| *page >= 1).unwrap_or(1);
        let page_size = match page_size {
            Some(size) if size >= 1 => size.min(MAX_PAGE_SIZE),
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, page_size }
    }

    #[must_use]
    pub fn offset(self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

fn blank_to_none(value: Option<&String>) -> Option<&str> {
    value.map(|value| value.trim()).filter(|value| !value.is_empty())
}

impl SubmissionQuery {
    /// # Errors
    /// Returns a client-facing message for the first unparseable value.
    pub fn filters(&self) -> Result<SubmissionFilters, &'static str> {
        let status = blank_to_none(self.status.as_ref())
            .map(|value| value.parse().map_err(|()| "Invalid status filter."))
            .transpose()?;
        let kind = blank_to_none(self.kind.as_ref())
            .map(|value| value.parse().map_err(|()| "Invalid type filter."))
            .transpose()?;
        let from = blank_to_none(self.from.as_ref())
            .map(|value| parse_bound(value, Bound::Start).ok_or("Invalid from date."))
            .transpose()?;
        let to = blank_to_none(self.to.as_ref())
            .map(|value| parse_bound(value, Bound::End).ok_or("Invalid to date."))
            .transpose()?;
        let has_file = blank_to_none(self.has_file.as_ref())
            .map(|value| parse_bool(value).ok_or("hasFile must be true or false."))
            .transpose()?;
        let search = blank_to_none(self.search.as_ref()).map(str::to_lowercase);

        Ok(SubmissionFilters {
            status,
            kind,
            from,
            to,
            has_file,
            search,
        })
    }

    /// # Errors
    /// Returns a client-facing message when page or pageSize is not an integer.
    pub fn pagination(&self) -> Result<Pagination, &'static str> {
        let page = blank_to_none(self.page.as_ref())
            .map(|value| value.parse::<i64>().map_err(|_| "page must be a number."))
            .transpose()?;
        let page_size = blank_to_none(self.page_size.as_ref())
            .map(|value| value.parse::<i64>().map_err(|_| "pageSize must be a number."))
            .transpose()?;
        Ok(Pagination::new(page, page_size))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// Timestamps without an offset are UTC; a bare end date covers the whole day.
fn parse_bound(value: &str, bound: Bound) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let start = date.and_hms_opt(0, 0, 0)?.and_utc();
    match bound {
        Bound::Start => Some(start),
        Bound::End => start
            .checked_add_days(Days::new(1))
            .map(|next| next - TimeDelta::microseconds(1)),
    }
}

/// Escape `LIKE` wildcards and wrap for substring matching.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in search.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Append `AND ...` conditions on the `s` (submissions) alias.
pub fn push_conditions(builder: &mut QueryBuilder<'_, Postgres>, filters: &SubmissionFilters) {
    if let Some(status) = filters.status {
        builder.push(" AND s.status = ").push_bind(status.code());
    }
    if let Some(kind) = filters.kind {
        builder.push(" AND s.type = ").push_bind(kind.code());
    }
    if let Some(from) = filters.from {
        builder.push(" AND s.created_at >= ").push_bind(from);
    }
    if let Some(to) = filters.to {
        builder.push(" AND s.created_at <= ").push_bind(to);
    }
    if let Some(has_file) = filters.has_file {
        builder.push(if has_file { " AND " } else { " AND NOT " });
        builder.push("EXISTS (SELECT 1 FROM submission_files sf WHERE sf.submission_id = s.id)");
    }
    if let Some(search) = &filters.search {
        let pattern = like_pattern(search);
        let columns = [
            "LOWER(s.name)",
            "LOWER(s.email)",
            "LOWER(s.domain)",
            "LOWER(COALESCE(s.message, ''))",
            "s.id::text",
        ];
        builder.push(" AND (");
        for (index, column) in columns.iter().enumerate() {
            if index > 0 {
                builder.push(" OR ");
            }
            builder
                .push(*column)
                .push(" LIKE ")
                .push_bind(pattern.clone())
                .push(r" ESCAPE '\'");
        }
        builder
            .push(" OR EXISTS (SELECT 1 FROM submission_fields f WHERE f.submission_id = s.id AND (LOWER(f.name) LIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR LOWER(f.value) LIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\')))");
    }
}
