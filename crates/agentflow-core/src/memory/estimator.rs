//! Character-class token estimator
//!
//! Used everywhere a real tokenizer is not available. The estimate does
//! not have to be accurate in absolute terms, but it is deterministic and
//! append-monotone: `estimate(s) <= estimate(s + x)`.

use once_cell::sync::Lazy;
use regex::Regex;

static LATIN_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z]+\b").unwrap());

/// Estimate the token count of a text.
///
/// CJK ideographs weigh 1.5 tokens, Latin words 1.3, every remaining
/// character 0.5: `floor(1.5*cjk + 1.3*words + 0.5*other)`.
pub fn estimate_tokens(text: &str) -> usize {
    let total_chars = text.chars().count();
    let cjk_chars = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    let latin_words = LATIN_WORD.find_iter(text).count();
    let other_chars = total_chars.saturating_sub(cjk_chars + latin_words);

    (cjk_chars as f64 * 1.5 + latin_words as f64 * 1.3 + other_chars as f64 * 0.5) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let text = "同一段 mixed 文本 repeated twice";
        assert_eq!(estimate_tokens(text), estimate_tokens(text));
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn cjk_weighs_more_than_other() {
        // 4 ideographs: floor(4 * 1.5) = 6
        assert_eq!(estimate_tokens("记忆压缩"), 6);
        // 4 punctuation chars: floor(4 * 0.5) = 2
        assert_eq!(estimate_tokens("!!!!"), 2);
    }

    #[test]
    fn latin_words_counted_once_each() {
        // 2 words, 9 non-word-count chars (11 total - 2 word matches)
        // floor(2*1.3 + 9*0.5) = floor(7.1) = 7
        assert_eq!(estimate_tokens("hello world"), 7);
    }

    #[test]
    fn append_monotone() {
        let base = "帮我 summarize this 文档";
        let suffixes = ["", " ", "x", " another word", "，继续", "多段落\n\ntext"];
        let mut grown = String::from(base);
        let mut previous = estimate_tokens(&grown);
        for suffix in suffixes {
            grown.push_str(suffix);
            let next = estimate_tokens(&grown);
            assert!(next >= previous, "estimate shrank after appending {suffix:?}");
            previous = next;
        }
    }

    #[test]
    fn longer_repetition_grows_linearly() {
        let once = estimate_tokens("数据 data ");
        let ten = estimate_tokens(&"数据 data ".repeat(10));
        assert!(ten >= once * 9, "repetition should scale the estimate");
    }
}
