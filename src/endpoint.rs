//! URL derivation for the room service and the session connection.
//!
//! A single base URL (the page origin in a browser build, e.g.
//! `https://quiz.example.com/`) yields both endpoints:
//!
//! - room creation: `POST <base>/create_room`
//! - session: `<ws|wss>://<host>/ws?room_id=<id>&name=<display name>`
//!
//! A secure base (`https`) always upgrades to a secure connection (`wss`).

use url::Url;

use crate::error::{QuizError, Result};

/// Path of the room-creation endpoint, relative to the base URL.
pub const CREATE_ROOM_PATH: &str = "create_room";

/// Path of the session endpoint, relative to the base URL.
pub const SESSION_PATH: &str = "ws";

/// Query keys that carry a room id in an invitation link.
const INVITATION_ROOM_KEYS: [&str; 2] = ["room_id", "r"];

/// Parse a user-supplied base URL.
///
/// # Errors
///
/// Returns [`QuizError::InvalidUrl`] if the string is not an absolute URL.
pub fn parse_base(base: &str) -> Result<Url> {
    Ok(Url::parse(base.trim())?)
}

/// The room-creation endpoint for `base`.
///
/// # Errors
///
/// Returns [`QuizError::InvalidUrl`] if the path cannot be joined.
pub fn create_room_url(base: &Url) -> Result<Url> {
    Ok(base.join(CREATE_ROOM_PATH)?)
}

/// The session endpoint for `base`, with the scheme upgraded and the
/// `room_id` and `name` query parameters encoded.
///
/// # Errors
///
/// Returns [`QuizError::InvalidUrl`] if `base` is not an `http`, `https`,
/// `ws`, or `wss` URL.
pub fn session_url(base: &Url, room_id: &str, display_name: &str) -> Result<Url> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(QuizError::InvalidUrl(format!(
                "unsupported scheme {other:?} in {base}"
            )))
        }
    };

    let mut url = base.join(SESSION_PATH)?;
    url.set_scheme(scheme)
        .map_err(|()| QuizError::InvalidUrl(format!("cannot use scheme {scheme} for {base}")))?;
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair("room_id", room_id)
        .append_pair("name", display_name);
    Ok(url)
}

/// Extract a room id from an invitation link such as
/// `http://host/?room_id=AB12CD`. Returns `None` for anything that is not an
/// absolute URL carrying a non-empty `room_id` (or `r`) parameter.
pub fn room_id_from_invitation(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    INVITATION_ROOM_KEYS.iter().find_map(|key| {
        url.query_pairs()
            .find(|(k, v)| k == key && !v.trim().is_empty())
            .map(|(_, v)| v.trim().to_string())
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn create_room_url_joins_path() {
        let base = parse_base("http://localhost:3030").unwrap();
        assert_eq!(
            create_room_url(&base).unwrap().as_str(),
            "http://localhost:3030/create_room"
        );
    }

    #[test]
    fn session_url_upgrades_plain_scheme() {
        let base = parse_base("http://localhost:3030/").unwrap();
        let url = session_url(&base, "R1", "Ann").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3030/ws?room_id=R1&name=Ann");
    }

    #[test]
    fn session_url_upgrades_secure_scheme() {
        let base = parse_base("https://quiz.example.com/").unwrap();
        let url = session_url(&base, "R1", "Ann").unwrap();
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn session_url_encodes_name() {
        let base = parse_base("http://h/").unwrap();
        let url = session_url(&base, "R1", "Ann & Bo=1").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            [
                ("room_id".to_string(), "R1".to_string()),
                ("name".to_string(), "Ann & Bo=1".to_string())
            ]
        );
        assert!(!url.as_str().contains("Ann & Bo"));
    }

    #[test]
    fn session_url_drops_base_query() {
        let base = parse_base("http://h/?room_id=OLD#frag").unwrap();
        let url = session_url(&base, "NEW", "x").unwrap();
        assert_eq!(url.as_str(), "ws://h/ws?room_id=NEW&name=x");
    }

    #[test]
    fn session_url_rejects_other_schemes() {
        let base = parse_base("ftp://h/").unwrap();
        assert!(matches!(
            session_url(&base, "R1", "Ann"),
            Err(QuizError::InvalidUrl(_))
        ));
    }

    #[test]
    fn parse_base_rejects_relative() {
        assert!(matches!(parse_base("/just/a/path"), Err(QuizError::InvalidUrl(_))));
    }

    #[test]
    fn invitation_room_id() {
        assert_eq!(
            room_id_from_invitation("http://localhost:3030/?room_id=AB12CD").as_deref(),
            Some("AB12CD")
        );
        assert_eq!(
            room_id_from_invitation("https://x/?r=R1").as_deref(),
            Some("R1")
        );
        assert_eq!(room_id_from_invitation("AB12CD"), None);
        assert_eq!(room_id_from_invitation("https://x/?room_id="), None);
    }
}
