//! Permalinks back to the source message

/// Build a permalink to a message, when one can be constructed.
///
/// Public chats link through their username. Private groups and channels
/// use the numeric `/c/` form with the `-100` kind prefix stripped from
/// the chat id. Chats whose id is not numeric get no link.
pub fn permalink(chat_username: Option<&str>, chat_id: &str, message_id: &str) -> Option<String> {
    if let Some(username) = chat_username.filter(|u| !u.is_empty()) {
        return Some(format!("https://t.me/{username}/{message_id}"));
    }

    let numeric: i64 = chat_id.parse().ok()?;
    if numeric >= 0 {
        return None;
    }
    let digits = numeric.unsigned_abs().to_string();
    let internal = if digits.len() > 4 { &digits[4..] } else { &digits[..] };
    Some(format!("https://t.me/c/{internal}/{message_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_chat_links_through_username() {
        assert_eq!(
            permalink(Some("devjobs"), "-1001234567890", "42"),
            Some("https://t.me/devjobs/42".into())
        );
    }

    #[test]
    fn private_chat_strips_kind_prefix() {
        assert_eq!(
            permalink(None, "-1001234567890", "42"),
            Some("https://t.me/c/1234567890/42".into())
        );
    }

    #[test]
    fn short_negative_id_is_kept_whole() {
        assert_eq!(permalink(None, "-123", "7"), Some("https://t.me/c/123/7".into()));
    }

    #[test]
    fn positive_or_non_numeric_ids_get_no_link() {
        assert_eq!(permalink(None, "12345", "1"), None);
        assert_eq!(permalink(None, "abc", "1"), None);
        assert_eq!(permalink(Some(""), "abc", "1"), None);
    }
}
