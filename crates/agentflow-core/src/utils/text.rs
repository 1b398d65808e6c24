//! Text truncation helpers used by the compression fallbacks

/// First `n` characters of a string (char-safe, never panics on UTF-8).
pub fn truncate_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// First `n` whitespace-separated words of a string.
pub fn truncate_words(text: &str, n: usize) -> String {
    text.split_whitespace()
        .take(n)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_chars_is_utf8_safe() {
        let text = "记忆压缩服务 compression";
        let cut = truncate_chars(text, 4);
        assert_eq!(cut, "记忆压缩");
    }

    #[test]
    fn truncate_chars_short_input_unchanged() {
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn truncate_words_takes_prefix() {
        assert_eq!(truncate_words("one two three four", 2), "one two");
        assert_eq!(truncate_words("one", 5), "one");
        assert_eq!(truncate_words("", 5), "");
    }
}
