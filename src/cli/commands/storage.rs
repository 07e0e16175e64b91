use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_PRIVATE_ROOT: &str = "private-root";
pub const ARG_PUBLIC_ROOT: &str = "public-root";

#[derive(Debug, Clone)]
pub struct Options {
    pub private_root: PathBuf,
    pub public_root: PathBuf,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let path_or = |id: &str, default: &str| {
            matches
                .get_one::<String>(id)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map_or_else(|| PathBuf::from(default), PathBuf::from)
        };

        Self {
            private_root: path_or(ARG_PRIVATE_ROOT, "uploads_private"),
            public_root: path_or(ARG_PUBLIC_ROOT, "wwwroot"),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PRIVATE_ROOT)
                .long(ARG_PRIVATE_ROOT)
                .help("Directory for submission attachments (never served directly)")
                .env("PURPLE_PRIVATE_ROOT")
                .default_value("uploads_private"),
        )
        .arg(
            Arg::new(ARG_PUBLIC_ROOT)
                .long(ARG_PUBLIC_ROOT)
                .help("Web root; public uploads land in <public-root>/uploads and are served at /uploads")
                .env("PURPLE_PUBLIC_ROOT")
                .default_value("wwwroot"),
        )
}
