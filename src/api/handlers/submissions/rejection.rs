//! Demo rejection letter.
//!
//! The text is stored on the submission as the `autoRejectionBody` field for
//! staff to send by hand; it is never mailed automatically.

pub const REJECTION_FIELD: &str = "autoRejectionBody";

const ARTIST_KEYS: &[&str] = &["artistName", "artist", "name"];
const TRACK_KEYS: &[&str] = &["trackTitle", "track", "title", "songTitle", "song"];

/// First non-blank value among `keys`, tried in order, names compared case-insensitively.
fn find_field<'a>(fields: &'a [(String, String)], keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| {
        fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    })
}

#[must_use]
pub fn artist_name<'a>(submission_name: &'a str, fields: &'a [(String, String)]) -> &'a str {
    let name = submission_name.trim();
    if !name.is_empty() {
        return name;
    }
    find_field(fields, ARTIST_KEYS).unwrap_or("there")
}

#[must_use]
pub fn track_title(fields: &[(String, String)]) -> &str {
    find_field(fields, TRACK_KEYS).unwrap_or("your track")
}

#[must_use]
pub fn rejection_body(submission_name: &str, fields: &[(String, String)]) -> String {
    let artist = artist_name(submission_name, fields);
    let track = track_title(fields);
    format!(
        "Hi {artist},\n\
         \n\
         Thank you for sending {track}. After careful consideration, we have decided not to move forward with a release for this track.\n\
         \n\
         Due to the volume of submissions we receive, we can\u{2019}t always provide detailed feedback, but we truly appreciate you sharing your work with us. Please don\u{2019}t hesitate to send future demos, We are always keen to hear what you are working on next.\n\
         \n\
         Wishing you the best,\n\
         Your Purple Crunch Records Team\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn submission_name_wins() {
        let f = fields(&[("artistName", "DJ Purple")]);
        assert_eq!(artist_name(" Ada ", &f), "Ada");
        assert_eq!(artist_name("  ", &f), "DJ Purple");
        assert_eq!(artist_name("", &[]), "there");
    }

    #[test]
    fn track_lookup_is_ordered_and_skips_blanks() {
        let f = fields(&[("SONG", "B-side"), ("TrackTitle", "  "), ("title", "Night Drive")]);
        assert_eq!(track_title(&f), "Night Drive");
        assert_eq!(track_title(&[]), "your track");
    }

    #[test]
    fn body_follows_template() {
        let body = rejection_body("Ada", &fields(&[("track", "Night Drive")]));
        assert!(body.starts_with("Hi Ada,\n\nThank you for sending Night Drive. After careful"));
        assert!(body.contains("we can\u{2019}t always provide detailed feedback"));
        assert!(body.ends_with("Wishing you the best,\nYour Purple Crunch Records Team\n"));
    }
}
