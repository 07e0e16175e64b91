use clap::{Arg, ArgMatches, Command};

use crate::api::handlers::submissions::NotificationRecipients;

pub const ARG_NOTIFY_SHARED_INBOX: &str = "notify-shared-inbox";
pub const ARG_NOTIFY_PUBLISHING: &str = "notify-publishing";
pub const ARG_NOTIFY_SUPPORT: &str = "notify-support";
pub const ARG_NOTIFY_INFO: &str = "notify-info";
pub const ARG_NOTIFY_LEGAL: &str = "notify-legal";

#[must_use]
pub fn parse(matches: &ArgMatches) -> NotificationRecipients {
    let get = |id: &str| {
        matches
            .get_one::<String>(id)
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    };

    NotificationRecipients {
        shared_inbox: get(ARG_NOTIFY_SHARED_INBOX),
        publishing: get(ARG_NOTIFY_PUBLISHING),
        support: get(ARG_NOTIFY_SUPPORT),
        info: get(ARG_NOTIFY_INFO),
        legal: get(ARG_NOTIFY_LEGAL),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_NOTIFY_SHARED_INBOX)
                .long(ARG_NOTIFY_SHARED_INBOX)
                .help("Address notified of every new submission")
                .env("PURPLE_NOTIFY_SHARED_INBOX"),
        )
        .arg(
            Arg::new(ARG_NOTIFY_PUBLISHING)
                .long(ARG_NOTIFY_PUBLISHING)
                .help("Address notified of artist, songwriter, and sync submissions")
                .env("PURPLE_NOTIFY_PUBLISHING"),
        )
        .arg(
            Arg::new(ARG_NOTIFY_SUPPORT)
                .long(ARG_NOTIFY_SUPPORT)
                .help("Address notified of support form submissions")
                .env("PURPLE_NOTIFY_SUPPORT"),
        )
        .arg(
            Arg::new(ARG_NOTIFY_INFO)
                .long(ARG_NOTIFY_INFO)
                .help("Address notified of general contact inquiries")
                .env("PURPLE_NOTIFY_INFO"),
        )
        .arg(
            Arg::new(ARG_NOTIFY_LEGAL)
                .long(ARG_NOTIFY_LEGAL)
                .help("Address additionally notified of sync requests")
                .env("PURPLE_NOTIFY_LEGAL"),
        )
}
