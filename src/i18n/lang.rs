//! Request language detection.

/// Language used when a request does not name one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Extract the primary language subtag of the first `Accept-Language` entry.
///
/// `"vi-VN,vi;q=0.9,en;q=0.8"` yields `Some("vi")`. Wildcards and empty
/// values yield `None`.
pub fn parse_accept_language(header: &str) -> Option<String> {
    let first = header.split(',').next()?;
    let tag = first.split(';').next()?.trim();
    let primary = tag.split(['-', '_']).next()?.trim();

    if primary.is_empty() || primary == "*" || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some(primary.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_tag() {
        assert_eq!(parse_accept_language("vi"), Some("vi".to_string()));
        assert_eq!(parse_accept_language("EN"), Some("en".to_string()));
    }

    #[test]
    fn test_parse_region_and_weights() {
        assert_eq!(
            parse_accept_language("vi-VN,vi;q=0.9,en;q=0.8"),
            Some("vi".to_string())
        );
        assert_eq!(parse_accept_language("en_US;q=0.7"), Some("en".to_string()));
    }

    #[test]
    fn test_parse_rejects_wildcard_and_garbage() {
        assert_eq!(parse_accept_language(""), None);
        assert_eq!(parse_accept_language("*"), None);
        assert_eq!(parse_accept_language(" ,en"), None);
        assert_eq!(parse_accept_language("12"), None);
    }
}
