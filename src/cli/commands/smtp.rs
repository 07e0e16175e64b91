use anyhow::{Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USER: &str = "smtp-user";
pub const ARG_SMTP_PASS: &str = "smtp-pass";
pub const ARG_SMTP_FROM_EMAIL: &str = "smtp-from-email";
pub const ARG_SMTP_FROM_NAME: &str = "smtp-from-name";
pub const ARG_SMTP_STARTTLS: &str = "smtp-starttls";
pub const ARG_EMAIL_LOG_ONLY: &str = "email-log-only";

/// Outbound mail settings. `host` is `None` when SMTP is not configured.
#[derive(Debug, Clone)]
pub struct Options {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<SecretString>,
    pub from_email: Option<String>,
    pub from_name: String,
    pub starttls: bool,
    pub log_only: bool,
}

impl Options {
    /// Parse SMTP arguments.
    ///
    /// # Errors
    /// Returns an error when a host is given without a sender address or user to send as.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = get_non_empty(ARG_SMTP_HOST);
        let user = get_non_empty(ARG_SMTP_USER);
        let from_email = get_non_empty(ARG_SMTP_FROM_EMAIL).or_else(|| user.clone());
        if host.is_some() && from_email.is_none() {
            bail!("--{ARG_SMTP_FROM_EMAIL} or --{ARG_SMTP_USER} is required when --{ARG_SMTP_HOST} is set");
        }

        Ok(Self {
            host,
            port: matches.get_one::<u16>(ARG_SMTP_PORT).copied().unwrap_or(587),
            user,
            pass: matches
                .get_one::<String>(ARG_SMTP_PASS)
                .filter(|value| !value.is_empty())
                .map(|value| SecretString::from(value.clone())),
            from_email,
            from_name: get_non_empty(ARG_SMTP_FROM_NAME)
                .unwrap_or_else(|| "Purple Publishing".to_string()),
            starttls: matches
                .get_one::<bool>(ARG_SMTP_STARTTLS)
                .copied()
                .unwrap_or(true),
            log_only: matches.get_flag(ARG_EMAIL_LOG_ONLY),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host; replies fail and notifications are skipped when unset")
                .env("PURPLE_SMTP_HOST"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port")
                .env("PURPLE_SMTP_PORT")
                .default_value("587")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USER)
                .long(ARG_SMTP_USER)
                .help("SMTP username")
                .env("PURPLE_SMTP_USER"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASS)
                .long(ARG_SMTP_PASS)
                .help("SMTP password")
                .env("PURPLE_SMTP_PASS")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SMTP_FROM_EMAIL)
                .long(ARG_SMTP_FROM_EMAIL)
                .help("Sender address (defaults to the SMTP username)")
                .env("PURPLE_SMTP_FROM_EMAIL"),
        )
        .arg(
            Arg::new(ARG_SMTP_FROM_NAME)
                .long(ARG_SMTP_FROM_NAME)
                .help("Sender display name")
                .env("PURPLE_SMTP_FROM_NAME")
                .default_value("Purple Publishing"),
        )
        .arg(
            Arg::new(ARG_SMTP_STARTTLS)
                .long(ARG_SMTP_STARTTLS)
                .help("Use STARTTLS when talking to the relay")
                .env("PURPLE_SMTP_STARTTLS")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_EMAIL_LOG_ONLY)
                .long(ARG_EMAIL_LOG_ONLY)
                .help("Log outgoing email instead of sending it (local development)")
                .env("PURPLE_EMAIL_LOG_ONLY")
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleared<F: FnOnce() -> Result<()>>(f: F) -> Result<()> {
        temp_env::with_vars(
            [
                ("PURPLE_SMTP_HOST", None::<&str>),
                ("PURPLE_SMTP_PORT", None::<&str>),
                ("PURPLE_SMTP_USER", None::<&str>),
                ("PURPLE_SMTP_PASS", None::<&str>),
                ("PURPLE_SMTP_FROM_EMAIL", None::<&str>),
                ("PURPLE_SMTP_FROM_NAME", None::<&str>),
                ("PURPLE_SMTP_STARTTLS", None::<&str>),
                ("PURPLE_EMAIL_LOG_ONLY", None::<&str>),
            ],
            f,
        )
    }

    #[test]
    fn unconfigured_by_default() -> Result<()> {
        cleared(|| {
            let matches = with_args(Command::new("purple")).try_get_matches_from(["purple"])?;
            let options = Options::parse(&matches)?;
            assert!(options.host.is_none());
            assert_eq!(options.port, 587);
            assert_eq!(options.from_name, "Purple Publishing");
            assert!(options.starttls);
            assert!(!options.log_only);
            Ok(())
        })
    }

    #[test]
    fn from_email_falls_back_to_user() -> Result<()> {
        cleared(|| {
            let matches = with_args(Command::new("purple")).try_get_matches_from([
                "purple",
                "--smtp-host",
                "smtp.purple.test",
                "--smtp-user",
                "inbox@purple.test",
                "--smtp-starttls",
                "false",
                "--email-log-only",
            ])?;
            let options = Options::parse(&matches)?;
            assert_eq!(options.host.as_deref(), Some("smtp.purple.test"));
            assert_eq!(options.from_email.as_deref(), Some("inbox@purple.test"));
            assert!(!options.starttls);
            assert!(options.log_only);
            Ok(())
        })
    }

    #[test]
    fn host_without_sender_is_rejected() -> Result<()> {
        cleared(|| {
            let matches = with_args(Command::new("purple"))
                .try_get_matches_from(["purple", "--smtp-host", "smtp.purple.test"])?;
            assert!(Options::parse(&matches).is_err());
            Ok(())
        })
    }
}
