//! Provenance snippet selection.
//!
//! When a fact is extracted from a window, we keep a short slice of the
//! window as provenance: the sentence whose embedding best matches the fact
//! summary, extended with surrounding context on both sides under a char
//! cap. The selected sentence itself is never truncated unless it alone
//! exceeds the cap.

use lorekeep_core::Embedder;
use lorekeep_world::scoring;

/// Splits text into sentences after `.`, `!`, or `?` followed by whitespace.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if matches!(ch, b'.' | b'!' | b'?') {
            let next = bytes.get(i + 1).copied();
            if next.is_none_or(|b| b.is_ascii_whitespace()) {
                let sentence = text[start..=i].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = i + 1;
            }
        }
        i += 1;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Picks the snippet of `window` most relevant to `summary`, capped at
/// `max_chars`.
///
/// Falls back to a leading slice whenever the summary is unusable or
/// embedding fails, so this never errors.
pub async fn select_relevant_snippet<E: Embedder>(
    embedder: &E,
    window: &str,
    summary: &str,
    max_chars: usize,
) -> String {
    let text = window.trim();
    if text.is_empty() {
        return String::new();
    }
    let summary = summary.trim();
    if summary.chars().count() < 8 {
        return leading_slice(text, max_chars);
    }

    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return leading_slice(text, max_chars);
    }

    let Ok(summary_vector) = embedder.embed(summary).await else {
        return leading_slice(text, max_chars);
    };

    let mut best_index = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (index, sentence) in sentences.iter().enumerate() {
        let Ok(sentence_vector) = embedder.embed(sentence).await else {
            continue;
        };
        let score = scoring::similarity(&summary_vector, &sentence_vector);
        if score > best_score {
            best_score = score;
            best_index = index;
        }
    }

    let target = sentences[best_index];
    let target_len = target.chars().count();
    if target_len >= max_chars {
        return leading_slice(target, max_chars);
    }

    // Spread the remaining budget over the neighboring context.
    let remaining = max_chars - target_len;
    let left_budget = remaining / 2;
    let right_budget = remaining - left_budget;

    let left_context = sentences[..best_index].join(" ");
    let right_context = sentences[best_index + 1..].join(" ");

    let mut left_piece: Vec<char> = {
        let chars: Vec<char> = left_context.chars().collect();
        let keep = chars.len().saturating_sub(left_budget);
        chars[keep..].to_vec()
    };
    let mut right_piece: Vec<char> = right_context.chars().take(right_budget).collect();

    // Joining spaces may push past the cap; shave context, never the target.
    let total = |l: &Vec<char>, r: &Vec<char>| {
        let joins = usize::from(!l.is_empty()) + usize::from(!r.is_empty());
        l.len() + target_len + r.len() + joins
    };
    while total(&left_piece, &right_piece) > max_chars {
        if right_piece.len() >= left_piece.len() && !right_piece.is_empty() {
            right_piece.pop();
        } else if !left_piece.is_empty() {
            left_piece.remove(0);
        } else {
            break;
        }
    }

    let mut snippet = String::new();
    if !left_piece.is_empty() {
        snippet.extend(left_piece);
        snippet.push(' ');
    }
    snippet.push_str(target);
    if !right_piece.is_empty() {
        snippet.push(' ');
        snippet.extend(right_piece);
    }
    snippet.trim().to_string()
}

fn leading_slice(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
