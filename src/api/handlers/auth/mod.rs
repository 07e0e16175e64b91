//! Staff authentication.
//!
//! Passwords are PBKDF2-HMAC-SHA256 hashes; sessions are stateless HS256
//! bearer tokens. There is no refresh, revocation, or lockout: a token stays
//! valid until it expires, even if the account is disabled meanwhile.

pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod principal;
mod state;
pub(crate) mod types;

pub use principal::{Permission, Principal, Role};
pub use state::{AuthConfig, AuthState};
