//! Compact HS256 JSON Web Tokens for staff sessions.
//!
//! Tokens carry the user id (`sub`), email and role, plus the usual `iss`,
//! `aud`, `iat` and `exp` claims. Signing uses a shared secret; there is no
//! key rotation, refresh or revocation.

mod hs256;

pub use hs256::{Error, MIN_SECRET_LEN, StaffClaims, TokenHeader, sign_hs256, verify_hs256};
