//! Authenticated principal extraction and role checks.
//!
//! Flow Overview: read the `Authorization: Bearer` header, verify the HS256
//! token, and return a principal carrying the user id, email, and role. The
//! role in the token is authoritative until the token expires.

use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use chrono::Utc;
use std::{fmt, str::FromStr};
use tracing::debug;
use uuid::Uuid;

use super::state::AuthState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Editor,
    Inbox,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Editor => "Editor",
            Self::Inbox => "Inbox",
        }
    }

    #[must_use]
    pub const fn allows(self, permission: Permission) -> bool {
        match permission {
            Permission::CmsWrite => matches!(self, Self::Admin | Self::Editor),
            Permission::InboxRead => matches!(self, Self::Admin | Self::Inbox),
            Permission::InboxAdmin | Permission::PublicUploads | Permission::UserManagement => {
                matches!(self, Self::Admin)
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact, case-sensitive match after trimming.
impl FromStr for Role {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Admin" => Ok(Self::Admin),
            "Editor" => Ok(Self::Editor),
            "Inbox" => Ok(Self::Inbox),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    /// `PUT /api/cms`
    CmsWrite,
    /// List, detail, status, reply, download.
    InboxRead,
    /// Delete, accept, reject, export.
    InboxAdmin,
    PublicUploads,
    UserManagement,
}

/// Authenticated staff member derived from the bearer token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        self.role.allows(permission)
    }

    #[must_use]
    pub fn is(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the bearer token into a principal, or return 401.
pub fn require_auth(headers: &HeaderMap, auth: &AuthState) -> Result<Principal, StatusCode> {
    let token = bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = auth
        .verify_token(token, Utc::now().timestamp())
        .map_err(|err| {
            debug!("Rejected bearer token: {err}");
            StatusCode::UNAUTHORIZED
        })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;
    let role = Role::from_str(&claims.role).map_err(|()| StatusCode::UNAUTHORIZED)?;

    Ok(Principal {
        user_id,
        email: claims.email,
        role,
    })
}

/// Like [`require_auth`], plus 403 when the role lacks `permission`.
pub fn require_permission(
    headers: &HeaderMap,
    auth: &AuthState,
    permission: Permission,
) -> Result<Principal, StatusCode> {
    let principal = require_auth(headers, auth)?;
    if principal.allows(permission) {
        Ok(principal)
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::state::AuthConfig;
    use axum::http::HeaderValue;
    use bearer_token::StaffClaims;
    use secrecy::SecretString;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn auth_state() -> AuthState {
        AuthState::new(AuthConfig::new(SecretString::from(KEY)))
    }

    fn headers_with(value: &str) -> Result<HeaderMap, axum::http::header::InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value)?);
        Ok(headers)
    }

    fn claims(role: &str) -> StaffClaims {
        let now = Utc::now().timestamp();
        StaffClaims {
            sub: Uuid::new_v4().to_string(),
            email: "staff@purple.test".to_string(),
            role: role.to_string(),
            iss: "purple".to_string(),
            aud: "purple-admin".to_string(),
            iat: now,
            exp: now + 600,
        }
    }

    #[test]
    fn role_table_matches_permissions() {
        use Permission::{CmsWrite, InboxAdmin, InboxRead, PublicUploads, UserManagement};
        let all = [CmsWrite, InboxRead, InboxAdmin, PublicUploads, UserManagement];
        assert!(all.iter().all(|p| Role::Admin.allows(*p)));

        assert!(Role::Editor.allows(CmsWrite));
        assert!(!Role::Editor.allows(InboxRead));
        assert!(!Role::Editor.allows(UserManagement));

        assert!(Role::Inbox.allows(InboxRead));
        assert!(!Role::Inbox.allows(InboxAdmin));
        assert!(!Role::Inbox.allows(CmsWrite));
        assert!(!Role::Inbox.allows(PublicUploads));
    }

    #[test]
    fn role_parse_is_exact_case() {
        assert_eq!(Role::from_str(" Admin "), Ok(Role::Admin));
        assert_eq!(Role::from_str("Inbox"), Ok(Role::Inbox));
        assert_eq!(Role::from_str("admin"), Err(()));
        assert_eq!(Role::from_str(""), Err(()));
    }

    #[test]
    fn missing_or_malformed_header_is_401() -> anyhow::Result<()> {
        let auth = auth_state();
        assert_eq!(
            require_auth(&HeaderMap::new(), &auth).err(),
            Some(StatusCode::UNAUTHORIZED)
        );
        for value in ["Basic abc", "Bearer", "Bearer    ", "token-only"] {
            assert_eq!(
                require_auth(&headers_with(value)?, &auth).err(),
                Some(StatusCode::UNAUTHORIZED),
                "{value}"
            );
        }
        Ok(())
    }

    #[test]
    fn valid_token_yields_principal() -> anyhow::Result<()> {
        let auth = auth_state();
        let claims = claims("Editor");
        let token = auth.sign(&claims)?;

        let principal = require_auth(&headers_with(&format!("Bearer {token}"))?, &auth)
            .map_err(|status| anyhow::anyhow!("unexpected {status}"))?;
        assert_eq!(principal.user_id.to_string(), claims.sub);
        assert_eq!(principal.email, "staff@purple.test");
        assert_eq!(principal.role, Role::Editor);
        Ok(())
    }

    #[test]
    fn lacking_permission_is_403() -> anyhow::Result<()> {
        let auth = auth_state();
        let token = auth.sign(&claims("Inbox"))?;
        let headers = headers_with(&format!("bearer {token}"))?;

        assert!(require_permission(&headers, &auth, Permission::InboxRead).is_ok());
        assert_eq!(
            require_permission(&headers, &auth, Permission::UserManagement).err(),
            Some(StatusCode::FORBIDDEN)
        );
        Ok(())
    }

    #[test]
    fn unknown_role_in_token_is_401() -> anyhow::Result<()> {
        let auth = auth_state();
        let token = auth.sign(&claims("Superuser"))?;
        let headers = headers_with(&format!("Bearer {token}"))?;
        assert_eq!(
            require_auth(&headers, &auth).err(),
            Some(StatusCode::UNAUTHORIZED)
        );
        Ok(())
    }

    #[test]
    fn token_from_other_key_is_401() -> anyhow::Result<()> {
        let other = AuthState::new(AuthConfig::new(SecretString::from(
            "ffffffffffffffffffffffffffffffff",
        )));
        let token = other.sign(&claims("Admin"))?;
        let headers = headers_with(&format!("Bearer {token}"))?;
        assert_eq!(
            require_auth(&headers, &auth_state()).err(),
            Some(StatusCode::UNAUTHORIZED)
        );
        Ok(())
    }
}
