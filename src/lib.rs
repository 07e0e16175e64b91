//! # Purple (Marketing CMS & Submissions Inbox)
//!
//! `purple` is the backend for a music publishing company's marketing sites. It
//! stores CMS documents, takes public form submissions (demos, artist and
//! songwriter information, sync requests, support and general inquiries), and
//! gives staff an inbox to triage, answer, and export them.
//!
//! ## Staff Accounts
//!
//! Staff sign in with an email and password. Passwords are stored as
//! `PBKDF2$<iterations>$<salt>$<key>` (PBKDF2-HMAC-SHA256) and a successful
//! login returns an HS256 bearer token carrying the user id, email, and role.
//!
//! - **Admin:** everything, including user management, exports, and deletes.
//! - **Editor:** CMS writes.
//! - **Inbox:** reading and answering submissions.
//!
//! At least one active Admin must always exist. Demoting, disabling, or deleting
//! the last one is refused.
//!
//! ## Submissions
//!
//! Public forms post `multipart/form-data`. Attachments are written under the
//! private root (`submissions/<id>/`) and only staff can download them. Demo
//! uploads can be accepted or rejected exactly once; after that the status is
//! locked.
//!
//! ## CMS
//!
//! CMS documents are opaque JSON addressed by `(siteKey, key)`. The public
//! content endpoint resolves `siteKey.key` with an optional locale fallback.

pub mod api;
pub mod cli;
pub mod db;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
