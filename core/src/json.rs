//! Salvage parsing for model-produced JSON.
//!
//! Language models asked for JSON routinely wrap it in code fences, prefix it
//! with prose, or quote the whole object as a string. [`parse_lenient`] tries
//! the raw text first and then a series of repaired candidates before giving
//! up, so callers only see an error when no readable JSON exists at all.

use anyhow::anyhow;
use serde::de::DeserializeOwned;

/// Parses `raw` into `T`, tolerating the usual model formatting noise.
///
/// # Errors
///
/// Returns the last parse error (with a bounded sample of the offending
/// text) when none of the candidate repairs yields valid JSON for `T`.
pub fn parse_lenient<T: DeserializeOwned>(raw: &str) -> crate::Result<T> {
    let trimmed = raw.trim();
    let mut last_error: Option<serde_json::Error> = None;

    for candidate in candidates(trimmed) {
        match serde_json::from_str::<T>(&candidate) {
            Ok(value) => return Ok(value),
            Err(err) => last_error = Some(err),
        }
    }

    let sample: String = trimmed.chars().take(300).collect();
    match last_error {
        Some(err) => Err(anyhow!(err).context(format!("no parseable JSON in model output: {sample}"))),
        None => Err(anyhow!("model output was empty")),
    }
}

fn candidates(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut push = |candidate: Option<String>| {
        if let Some(c) = candidate {
            if !c.is_empty() && out.iter().all(|seen: &String| seen != &c) {
                out.push(c);
            }
        }
    };

    push(Some(raw.to_string()));
    push(unfence(raw));
    push(balanced_block(raw, '{', '}'));
    push(balanced_block(raw, '[', ']'));
    push(unquote(raw));
    out
}

/// Strips a leading ```` ``` ````/```` ```json ```` fence and its closer.
fn unfence(raw: &str) -> Option<String> {
    let start = raw.find("```")?;
    let after = &raw[start + 3..];
    // Drop the optional language tag on the fence line.
    let body = after.split_once('\n').map_or(after, |(_, rest)| rest);
    let inner = body.rfind("```").map_or(body, |end| &body[..end]);
    let inner = inner.trim();
    (!inner.is_empty()).then(|| inner.to_string())
}

/// Extracts the first balanced `{...}` or `[...]` block, respecting strings.
fn balanced_block(raw: &str, open: char, close: char) -> Option<String> {
    let start = raw.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + close.len_utf8();
                    return Some(raw[start..end].trim().to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Unwraps output that arrived as one big JSON-encoded string.
fn unquote(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2) {
        return None;
    }
    let inner: String = serde_json::from_str(trimmed).ok()?;
    let inner = inner.trim();
    (!inner.is_empty()).then(|| inner.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Fact {
        summary: String,
        confidence: f32,
    }

    #[test]
    fn parses_plain_object() {
        let fact: Fact = parse_lenient(r#"{"summary":"a","confidence":0.9}"#).unwrap();
        assert_eq!(fact.summary, "a");
    }

    #[test]
    fn parses_fenced_object() {
        let raw = "```json\n{\"summary\":\"b\",\"confidence\":0.5}\n```";
        let fact: Fact = parse_lenient(raw).unwrap();
        assert_eq!(fact.summary, "b");
    }

    #[test]
    fn parses_object_with_surrounding_prose() {
        let raw = "Sure! Here you go: {\"summary\":\"c\",\"confidence\":0.7} Hope that helps.";
        let fact: Fact = parse_lenient(raw).unwrap();
        assert_eq!(fact.summary, "c");
    }

    #[test]
    fn parses_array_with_prose() {
        let raw = "facts follow [{\"summary\":\"d\",\"confidence\":1.0}] end";
        let facts: Vec<Fact> = parse_lenient(raw).unwrap();
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn parses_quoted_json_string() {
        let raw = r#""{\"summary\":\"e\",\"confidence\":0.2}""#;
        let fact: Fact = parse_lenient(raw).unwrap();
        assert_eq!(fact.summary, "e");
    }

    #[test]
    fn braces_inside_strings_do_not_truncate() {
        let raw = r#"noise {"summary":"open { not closed","confidence":0.4} tail"#;
        let fact: Fact = parse_lenient(raw).unwrap();
        assert_eq!(fact.summary, "open { not closed");
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_lenient::<Fact>("no json here").unwrap_err();
        assert!(err.to_string().contains("no parseable JSON"));
    }
}
