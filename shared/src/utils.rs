use ulid::Ulid;

pub fn generate_ulid() -> String {
    Ulid::new().to_string()
}

/// Cuts `content` to at most `max_bytes`, backing off to the previous char
/// boundary so multibyte characters are never split.
///
/// Used to keep upstream error bodies readable in logs and error messages.
pub fn truncate_at_char_boundary(content: &str, max_bytes: usize) -> &str {
    if content.len() <= max_bytes {
        return content;
    }

    let mut end = max_bytes;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }

    &content[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid_is_unique() {
        let a = generate_ulid();
        let b = generate_ulid();
        assert_eq!(a.len(), 26);
        assert_ne!(a, b);
    }

    #[test]
    fn test_truncate_short_content_unchanged() {
        assert_eq!(truncate_at_char_boundary("short", 100), "short");
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_at_char_boundary("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_multibyte_backs_off() {
        // \u{00E9} spans bytes 3..5
        let content = "caf\u{00E9}!";
        assert_eq!(truncate_at_char_boundary(content, 4), "caf");
    }

    #[test]
    fn test_truncate_to_zero() {
        assert_eq!(truncate_at_char_boundary("\u{1F600}abc", 2), "");
    }
}
