//! Content segmentation with overlapping boundaries

use agentflow_models::ContentSegment;

use crate::memory::estimator::estimate_tokens;

/// Split `content` on whitespace into segments whose estimated token
/// count stays below `target_token_limit`.
///
/// Adjacent segments overlap by `word_boundary` words so cross-segment
/// references survive the cut. Every word of the input appears in at
/// least one segment.
pub fn segment_content(
    content: &str,
    target_token_limit: usize,
    word_boundary: usize,
) -> Vec<ContentSegment> {
    let words: Vec<&str> = content.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;
    let mut index = 0usize;

    for word in words {
        let word_tokens = estimate_tokens(word);
        if current_tokens + word_tokens > target_token_limit && !current.is_empty() {
            let overlap: Vec<&str> = if current.len() >= word_boundary {
                current[current.len() - word_boundary..].to_vec()
            } else {
                current.clone()
            };
            let text = current.join(" ");
            segments.push(ContentSegment {
                index,
                estimated_tokens: estimate_tokens(&text),
                content: text,
                preserved_boundary: true,
            });
            index += 1;

            current = overlap;
            current.push(word);
            current_tokens = current.iter().map(|w| estimate_tokens(w)).sum();
        } else {
            current.push(word);
            current_tokens += word_tokens;
        }
    }

    if !current.is_empty() {
        let text = current.join(" ");
        segments.push(ContentSegment {
            index,
            estimated_tokens: current_tokens,
            content: text,
            preserved_boundary: true,
        });
    }

    segments
}
