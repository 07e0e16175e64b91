use crate::{
    api::{
        self, Services,
        email::sender_from_options,
        handlers::{
            auth::{AuthConfig, AuthState},
            submissions::{ExportLimit, NotificationRecipients, StoragePaths},
            uploads::UPLOADS_DIR,
        },
    },
    cli::commands::{auth, smtp, storage},
    db::AdminSeed,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_origin: String,
    pub auth: auth::Options,
    pub storage: storage::Options,
    pub smtp: smtp::Options,
    pub recipients: NotificationRecipients,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the storage roots cannot be created, the mail transport
/// cannot be built, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let auth_config = AuthConfig::new(args.auth.jwt_key.clone())
        .with_issuer(args.auth.jwt_issuer.clone())
        .with_audience(args.auth.jwt_audience.clone())
        .with_token_ttl_seconds(args.auth.jwt_ttl_seconds)
        .with_password_iterations(args.auth.password_iterations);

    let storage = StoragePaths::from(&args.storage);
    for dir in [
        storage.private_root.clone(),
        storage.public_root.join(UPLOADS_DIR),
    ] {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
    }

    let email = sender_from_options(&args.smtp)?;

    let admin_seed = args.auth.admin_password.clone().map(|password| AdminSeed {
        username: args.auth.admin_username.clone(),
        password,
    });

    let services = Services {
        auth: Arc::new(AuthState::new(auth_config)),
        storage: Arc::new(storage),
        email,
        recipients: Arc::new(args.recipients),
        export_limit: ExportLimit::default(),
    };

    api::new(
        args.port,
        args.dsn,
        &args.frontend_origin,
        services,
        admin_seed,
    )
    .await
}

fn log_startup_args(args: &Args) {
    let email_mode = if args.smtp.log_only {
        "log-only".to_string()
    } else {
        args.smtp
            .host
            .as_deref()
            .map_or_else(|| "disabled".to_string(), |host| format!("smtp:{host}:{}", args.smtp.port))
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("frontend_origin", args.frontend_origin.clone()),
        ("private_root", args.storage.private_root.display().to_string()),
        ("public_root", args.storage.public_root.display().to_string()),
        ("email", email_mode),
        ("jwt_issuer", args.auth.jwt_issuer.clone()),
        ("jwt_audience", args.auth.jwt_audience.clone()),
        ("seed_admin", args.auth.admin_password.is_some().to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "purple {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_password_is_redacted() {
        assert_eq!(
            redact_dsn("postgres://purple:secret@db:5432/purple"),
            "postgres://purple:REDACTED@db:5432/purple"
        );
        assert_eq!(
            redact_dsn("postgres://purple@db/purple"),
            "postgres://purple@db/purple"
        );
        assert_eq!(redact_dsn("not a dsn"), "invalid-dsn");
    }

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit("unknown"), "unknown");
        assert_eq!(short_commit("abc"), "abc");
    }
}
