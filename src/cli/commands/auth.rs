use anyhow::{Result, bail};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_KEY: &str = "jwt-key";
pub const ARG_JWT_ISSUER: &str = "jwt-issuer";
pub const ARG_JWT_AUDIENCE: &str = "jwt-audience";
pub const ARG_JWT_TTL_SECONDS: &str = "jwt-ttl-seconds";
pub const ARG_PASSWORD_ITERATIONS: &str = "password-iterations";
pub const ARG_ADMIN_USERNAME: &str = "admin-username";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";

#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_key: SecretString,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_ttl_seconds: i64,
    pub password_iterations: u32,
    pub admin_username: String,
    pub admin_password: Option<SecretString>,
}

impl Options {
    /// Parse token, password, and seed-admin arguments.
    ///
    /// # Errors
    /// Returns an error if the signing key is missing or shorter than the HS256 minimum,
    /// or if a numeric setting is out of range.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_key = match matches.get_one::<String>(ARG_JWT_KEY) {
            Some(value) if !value.trim().is_empty() => value.clone(),
            _ => bail!("missing required argument: --{ARG_JWT_KEY}"),
        };
        if jwt_key.len() < bearer_token::MIN_SECRET_LEN {
            bail!(
                "--{ARG_JWT_KEY} must be at least {} bytes",
                bearer_token::MIN_SECRET_LEN
            );
        }

        let jwt_ttl_seconds = matches
            .get_one::<i64>(ARG_JWT_TTL_SECONDS)
            .copied()
            .unwrap_or(8 * 60 * 60);
        if jwt_ttl_seconds <= 0 {
            bail!("--{ARG_JWT_TTL_SECONDS} must be positive");
        }

        let password_iterations = matches
            .get_one::<u32>(ARG_PASSWORD_ITERATIONS)
            .copied()
            .unwrap_or(100_000);
        if password_iterations == 0 {
            bail!("--{ARG_PASSWORD_ITERATIONS} must be positive");
        }

        let get_or = |id: &str, default: &str| {
            matches
                .get_one::<String>(id)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            jwt_key: SecretString::from(jwt_key),
            jwt_issuer: get_or(ARG_JWT_ISSUER, "purple"),
            jwt_audience: get_or(ARG_JWT_AUDIENCE, "purple-admin"),
            jwt_ttl_seconds,
            password_iterations,
            admin_username: get_or(ARG_ADMIN_USERNAME, "admin"),
            admin_password: matches
                .get_one::<String>(ARG_ADMIN_PASSWORD)
                .filter(|value| !value.is_empty())
                .map(|value| SecretString::from(value.clone())),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_admin_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_KEY)
                .long(ARG_JWT_KEY)
                .help("HS256 signing key for staff tokens (at least 32 bytes)")
                .env("PURPLE_JWT_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_JWT_ISSUER)
                .long(ARG_JWT_ISSUER)
                .help("Issuer (iss) written to and required on staff tokens")
                .env("PURPLE_JWT_ISSUER")
                .default_value("purple"),
        )
        .arg(
            Arg::new(ARG_JWT_AUDIENCE)
                .long(ARG_JWT_AUDIENCE)
                .help("Audience (aud) written to and required on staff tokens")
                .env("PURPLE_JWT_AUDIENCE")
                .default_value("purple-admin"),
        )
        .arg(
            Arg::new(ARG_JWT_TTL_SECONDS)
                .long(ARG_JWT_TTL_SECONDS)
                .help("Staff token lifetime in seconds")
                .env("PURPLE_JWT_TTL_SECONDS")
                .default_value("28800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_ITERATIONS)
                .long(ARG_PASSWORD_ITERATIONS)
                .help("PBKDF2 iterations for newly hashed passwords")
                .env("PURPLE_PASSWORD_ITERATIONS")
                .default_value("100000")
                .value_parser(clap::value_parser!(u32)),
        )
}

fn with_admin_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_USERNAME)
                .long(ARG_ADMIN_USERNAME)
                .help("Email/username of the seeded Admin account")
                .env("PURPLE_ADMIN_USERNAME")
                .default_value("admin"),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Password for the seeded Admin account (no seeding when unset)")
                .env("PURPLE_ADMIN_PASSWORD")
                .hide_env_values(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn command() -> Command {
        with_args(Command::new("purple"))
    }

    #[test]
    fn defaults_apply() -> Result<()> {
        temp_env::with_vars(
            [
                ("PURPLE_JWT_KEY", None::<&str>),
                ("PURPLE_ADMIN_PASSWORD", None::<&str>),
                ("PURPLE_JWT_TTL_SECONDS", None::<&str>),
            ],
            || {
                let matches = command().try_get_matches_from(["purple", "--jwt-key", KEY])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.jwt_key.expose_secret(), KEY);
                assert_eq!(options.jwt_issuer, "purple");
                assert_eq!(options.jwt_audience, "purple-admin");
                assert_eq!(options.jwt_ttl_seconds, 28_800);
                assert_eq!(options.password_iterations, 100_000);
                assert_eq!(options.admin_username, "admin");
                assert!(options.admin_password.is_none());
                Ok(())
            },
        )
    }

    #[test]
    fn short_key_is_rejected() -> Result<()> {
        temp_env::with_vars([("PURPLE_JWT_KEY", None::<&str>)], || {
            let matches = command().try_get_matches_from(["purple", "--jwt-key", "short"])?;
            let result = Options::parse(&matches);
            assert!(result.is_err());
            Ok(())
        })
    }

    #[test]
    fn missing_key_is_rejected() -> Result<()> {
        temp_env::with_vars([("PURPLE_JWT_KEY", None::<&str>)], || {
            let matches = command().try_get_matches_from(["purple"])?;
            let err = Options::parse(&matches).err().map(|err| err.to_string());
            assert_eq!(
                err.as_deref(),
                Some("missing required argument: --jwt-key")
            );
            Ok(())
        })
    }

    #[test]
    fn admin_password_from_env() -> Result<()> {
        temp_env::with_vars(
            [
                ("PURPLE_JWT_KEY", Some(KEY)),
                ("PURPLE_ADMIN_PASSWORD", Some("s3cret")),
                ("PURPLE_ADMIN_USERNAME", Some("boss@purple.test")),
            ],
            || {
                let matches = command().try_get_matches_from(["purple"])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.admin_username, "boss@purple.test");
                assert_eq!(
                    options
                        .admin_password
                        .as_ref()
                        .map(|secret| secret.expose_secret().to_string()),
                    Some("s3cret".to_string())
                );
                Ok(())
            },
        )
    }
}
