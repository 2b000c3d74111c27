/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Strip a surrounding markdown code fence, whatever its language tag
/// (```json, ```cypher, bare ```).
pub fn strip_code_blocks(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) if !rest[..newline].contains(char::is_whitespace) => &rest[newline + 1..],
        _ => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_multibyte_chars() {
        let text = "Pembrolizumab – anti-PD-1";
        let truncated = truncate_to_char_boundary(text, 15);
        assert!(truncated.len() <= 15);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_to_char_boundary("Keytruda", 100), "Keytruda");
    }

    #[test]
    fn fences_are_stripped_for_any_tag() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(
            strip_code_blocks("```cypher\nMATCH (n) RETURN n\n```"),
            "MATCH (n) RETURN n"
        );
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("  {}  "), "{}");
    }
}
