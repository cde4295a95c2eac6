/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip a markdown code fence (```` ``` ```` or ```` ```json ````) wrapping a model response.
pub fn strip_code_blocks(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_multibyte_boundary() {
        let text = "Yaoundé Douala";
        let truncated = truncate_to_char_boundary(text, 7);
        assert!(truncated.len() <= 7);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn truncate_within_bounds_is_identity() {
        assert_eq!(truncate_to_char_boundary("Buea", 100), "Buea");
    }

    #[test]
    fn strips_fenced_json() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```JSON\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("  {}  "), "{}");
    }

    #[test]
    fn unterminated_fence_keeps_body() {
        assert_eq!(strip_code_blocks("```json\n{\"a\":1}"), "{\"a\":1}");
    }
}
