pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Short hex id used to correlate log lines of a single request.
pub fn new_correlation_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    format!(
        "{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3]
    )
}

/// The first six characters of an id, used as a display fallback when a
/// participant has not published a name yet.
pub fn short_label(id: &str) -> String {
    id.chars().take(6).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn correlation_id_is_short_hex() {
        let cid = new_correlation_id();
        assert_eq!(cid.len(), 8);
        assert!(cid.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn short_label_truncates() {
        assert_eq!(short_label("abcdef123456"), "abcdef");
    }

    #[test]
    fn short_label_keeps_short_ids() {
        assert_eq!(short_label("p1"), "p1");
        assert_eq!(short_label(""), "");
    }

    #[test]
    fn short_label_is_char_safe() {
        assert_eq!(short_label("ñandú-peer"), "ñandú-");
    }
}
