//! Auth state and configuration.

use bearer_token::{StaffClaims, sign_hs256, verify_hs256};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use super::password::DEFAULT_ITERATIONS;
use super::principal::Role;

const DEFAULT_ISSUER: &str = "purple";
const DEFAULT_AUDIENCE: &str = "purple-admin";
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 8 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    signing_key: SecretString,
    issuer: String,
    audience: String,
    token_ttl_seconds: i64,
    password_iterations: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(signing_key: SecretString) -> Self {
        Self {
            signing_key,
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            password_iterations: DEFAULT_ITERATIONS,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: String) -> Self {
        self.audience = audience;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_password_iterations(mut self, iterations: u32) -> Self {
        self.password_iterations = iterations;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn password_iterations(&self) -> u32 {
        self.password_iterations
    }
}

/// Shared by every handler through an `Extension<Arc<AuthState>>`.
#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Issue a staff token valid from `now` for the configured lifetime.
    ///
    /// # Errors
    /// Returns an error if the signing key is too short.
    pub fn issue_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        now: i64,
    ) -> Result<String, bearer_token::Error> {
        let claims = StaffClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now,
            exp: now + self.config.token_ttl_seconds,
        };
        self.sign(&claims)
    }

    pub(crate) fn sign(&self, claims: &StaffClaims) -> Result<String, bearer_token::Error> {
        sign_hs256(self.config.signing_key.expose_secret().as_bytes(), claims)
    }

    /// Verify signature, issuer, audience, and expiry.
    ///
    /// # Errors
    /// Returns the codec error describing why the token was refused.
    pub fn verify_token(&self, token: &str, now: i64) -> Result<StaffClaims, bearer_token::Error> {
        verify_hs256(
            token,
            self.config.signing_key.expose_secret().as_bytes(),
            &self.config.issuer,
            &self.config.audience,
            now,
        )
    }
}
