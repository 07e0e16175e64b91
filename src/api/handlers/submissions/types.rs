//! Submission enums and request/response types.
//!
//! Enums travel as their numeric code in JSON. Query strings, multipart
//! fields, and JSON bodies also accept the name, case-insensitively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubmissionType {
    DemoUpload = 1,
    ArtistInformation = 2,
    SongwriterInformation = 3,
    SyncRequest = 4,
    GeneralContactInquiry = 5,
    SupportForm = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubmissionStatus {
    Unread = 1,
    Read = 2,
    InProgress = 3,
    Done = 4,
    Accepted = 5,
    Rejected = 6,
}

/// Implements code/name conversions for a fieldless `#[repr]`-style enum.
macro_rules! coded_enum {
    ($name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub const fn code(self) -> i16 {
                self as i16
            }

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }

            #[must_use]
            pub fn from_code(code: i16) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        /// Accepts the numeric code or the case-insensitive name.
        impl FromStr for $name {
            type Err = ();

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let value = value.trim();
                if let Ok(code) = value.parse::<i16>() {
                    return Self::from_code(code).ok_or(());
                }
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(value))
                    .ok_or(())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_i16(self.code())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match CodeOrName::deserialize(deserializer)? {
                    CodeOrName::Code(code) => Self::from_code(code),
                    CodeOrName::Name(name) => name.parse().ok(),
                }
                .ok_or_else(|| {
                    serde::de::Error::custom(concat!("unknown ", stringify!($name)))
                })
            }
        }
    };
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeOrName {
    Code(i16),
    Name(String),
}

coded_enum!(SubmissionType {
    DemoUpload = 1,
    ArtistInformation = 2,
    SongwriterInformation = 3,
    SyncRequest = 4,
    GeneralContactInquiry = 5,
    SupportForm = 6,
});

coded_enum!(SubmissionStatus {
    Unread = 1,
    Read = 2,
    InProgress = 3,
    Done = 4,
    Accepted = 5,
    Rejected = 6,
});

impl SubmissionStatus {
    /// Accepted and Rejected lock the submission.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SubmissionCreated {
    pub id: Uuid,
}

#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub name: String,
    pub value: String,
}

#[derive(ToSchema, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileView {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size: i64,
}

#[derive(ToSchema, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    pub id: Uuid,
    pub to_email: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub sent_by: String,
}

/// Submission columns shared by list items, details, and the export.
#[derive(ToSchema, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    pub id: Uuid,
    #[serde(rename = "type")]
    #[schema(value_type = i16)]
    pub kind: SubmissionType,
    #[schema(value_type = i16)]
    pub status: SubmissionStatus,
    pub domain: String,
    pub name: String,
    pub email: String,
    pub message: Option<String>,
    pub uploaded_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionListItem {
    #[serde(flatten)]
    pub submission: SubmissionSummary,
    pub replies_count: i64,
    pub fields: Vec<FieldView>,
    pub files: Vec<FileView>,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionListResponse {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<SubmissionListItem>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub submission: SubmissionSummary,
    pub fields: Vec<FieldView>,
    pub files: Vec<FileView>,
    pub replies: Vec<ReplyView>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct UpdateStatusRequest {
    #[schema(value_type = i16)]
    pub status: SubmissionStatus,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplyRequest {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RepliesResponse {
    pub replies: Vec<ReplyView>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RejectResponse {
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn parse_accepts_code_or_name() {
        assert_eq!("1".parse(), Ok(SubmissionType::DemoUpload));
        assert_eq!(" syncrequest ".parse(), Ok(SubmissionType::SyncRequest));
        assert_eq!("InProgress".parse(), Ok(SubmissionStatus::InProgress));
        assert_eq!("7".parse::<SubmissionStatus>(), Err(()));
        assert_eq!("Archived".parse::<SubmissionStatus>(), Err(()));
    }

    #[test]
    fn json_uses_numeric_codes() -> Result<()> {
        assert_eq!(serde_json::to_value(SubmissionType::SupportForm)?, json!(6));
        let request: UpdateStatusRequest = serde_json::from_value(json!({"status": 3}))?;
        assert_eq!(request.status, SubmissionStatus::InProgress);
        let request: UpdateStatusRequest = serde_json::from_value(json!({"status": "done"}))?;
        assert_eq!(request.status, SubmissionStatus::Done);
        assert!(serde_json::from_value::<UpdateStatusRequest>(json!({"status": 9})).is_err());
        Ok(())
    }

    #[test]
    fn list_item_flattens_submission_columns() -> Result<()> {
        let item = SubmissionListItem {
            submission: SubmissionSummary {
                id: Uuid::nil(),
                kind: SubmissionType::DemoUpload,
                status: SubmissionStatus::Unread,
                domain: "purple.test".to_string(),
                name: "Ada".to_string(),
                email: "ada@purple.test".to_string(),
                message: None,
                uploaded_by: Some("Artist".to_string()),
                created_at: DateTime::<Utc>::UNIX_EPOCH,
            },
            replies_count: 2,
            fields: vec![],
            files: vec![],
        };
        let value = serde_json::to_value(&item)?;
        assert_eq!(value["type"], json!(1));
        assert_eq!(value["uploadedBy"], json!("Artist"));
        assert_eq!(value["repliesCount"], json!(2));
        assert_eq!(value["message"], json!(null));
        Ok(())
    }
}
