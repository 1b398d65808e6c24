//! Token-limit error detection
//!
//! Providers ought to surface a typed overflow from their adapter; this
//! text parser is the fallback for providers that only hand back an error
//! string.

use once_cell::sync::Lazy;
use regex::Regex;

use agentflow_models::TokenInfo;

const LIMIT_KEYWORDS: &[&str] = &["token", "context", "length", "limit"];

/// Two integers >= 2000 are required before the text is treated as a
/// token report; smaller numbers are status codes and ids.
const MIN_TOKEN_NUMBER: usize = 2000;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4,})\b").unwrap());

/// Parse an error message into token info.
///
/// The text must contain one of the limit keywords and at least two
/// integers >= 2000. The smaller number is the model maximum, the larger
/// the current request size.
pub fn parse_token_limit(error_message: &str) -> Option<TokenInfo> {
    let lowered = error_message.to_lowercase();
    if !LIMIT_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return None;
    }

    let mut numbers: Vec<usize> = NUMBER
        .find_iter(error_message)
        .filter_map(|m| m.as_str().parse().ok())
        .filter(|&n| n >= MIN_TOKEN_NUMBER)
        .take(2)
        .collect();

    if numbers.len() < 2 {
        return None;
    }
    numbers.sort_unstable();

    Some(TokenInfo::new(numbers[1], numbers[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openai_style_message() {
        let info = parse_token_limit(
            "This model's maximum context length is 8192 tokens. \
             However, your messages resulted in 9000 tokens.",
        )
        .unwrap();
        assert_eq!(info.max_tokens, 8192);
        assert_eq!(info.current_tokens, 9000);
    }

    #[test]
    fn order_of_numbers_does_not_matter() {
        let info = parse_token_limit("context overflow: 12500 requested, window is 8192").unwrap();
        assert_eq!(info.max_tokens, 8192);
        assert_eq!(info.current_tokens, 12500);
    }

    #[test]
    fn requires_a_limit_keyword() {
        assert!(parse_token_limit("request failed: 8192 9000 internal error").is_none());
    }

    #[test]
    fn requires_two_large_numbers() {
        assert!(parse_token_limit("token error 8192").is_none());
        assert!(parse_token_limit("token error code 400, id 1234 too long").is_none());
    }

    #[test]
    fn small_numbers_are_ignored() {
        // 400 and 1999 are below the floor; 8192/16000 qualify.
        let info =
            parse_token_limit("error 400: prompt length 16000 exceeds 8192 (retry in 1999ms)")
                .unwrap();
        assert_eq!(info.max_tokens, 8192);
        assert_eq!(info.current_tokens, 16000);
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let info = parse_token_limit("Maximum CONTEXT exceeded: 9000 vs 8192").unwrap();
        assert_eq!(info.max_tokens, 8192);
    }
}
