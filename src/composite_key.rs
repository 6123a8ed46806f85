//! Composite keys built by joining attribute values.
//!
//! Keys are only ever constructed, never parsed back: every entity that owns a
//! composite key also stores the individual parts as plain attributes.
//! Parts are not escaped, so a part containing the separator can collide with
//! a different split of the same string.

pub const SEPARATOR: &str = "|";

pub fn encode<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<&str>>()
        .join(SEPARATOR)
}

/// Partition key of the title/artist secondary index.
pub fn title_artist(title: &str, artist: &str) -> String {
    encode(&[title, artist])
}

/// Primary key of the login table.
pub fn email_password(email: &str, password: &str) -> String {
    encode(&[email, password])
}

/// Hash key of the subscription table.
pub fn email_title_artist(email: &str, title: &str, artist: &str) -> String {
    encode(&[email, title, artist])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_parts_in_order() {
        assert_eq!(encode(&["a", "b", "c"]), "a|b|c");
        assert_eq!(title_artist("Song A", "Artist X"), "Song A|Artist X");
        assert_eq!(email_password("me@x.io", "pw"), "me@x.io|pw");
        assert_eq!(
            email_title_artist("me@x.io", "Song A", "Artist X"),
            "me@x.io|Song A|Artist X"
        );
    }

    #[test]
    fn single_and_empty_parts() {
        assert_eq!(encode(&["only"]), "only");
        assert_eq!(encode::<&str>(&[]), "");
        assert_eq!(title_artist("", "Artist"), "|Artist");
    }

    #[test]
    fn separator_inside_parts_can_collide() {
        // Accepted limitation: no escaping is applied.
        assert_eq!(title_artist("a|b", "c"), title_artist("a", "b|c"));
    }
}
