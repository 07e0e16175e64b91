use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    /// `Admin`, `Editor`, or `Inbox`.
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: String,
    /// Defaults to `true`.
    pub is_active: Option<bool>,
}

/// Partial update; blank strings and missing fields are left unchanged.
#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(default)]
pub struct SetRoleRequest {
    pub role: String,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Trimmed value, or `None` when missing or blank.
pub(super) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn update_request_fields_are_optional() -> Result<()> {
        let request: UpdateUserRequest = serde_json::from_str(r#"{"isActive":false}"#)?;
        assert_eq!(request.is_active, Some(false));
        assert!(request.email.is_none() && request.password.is_none() && request.role.is_none());
        Ok(())
    }

    #[test]
    fn set_active_requires_flag() {
        assert!(serde_json::from_str::<SetActiveRequest>("{}").is_err());
    }

    #[test]
    fn blank_values_are_ignored() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" Editor ")), Some("Editor"));
    }
}
