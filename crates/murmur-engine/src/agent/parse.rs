use murmur_types::SalienceMetadata;
use once_cell::sync::Lazy;
use regex::Regex;

static THINKING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<thinking>(.*?)</thinking>").unwrap());

static SALIENCE_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[U:(\d)\s*C:(\d)\]").unwrap());

static SALIENCE_TAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[U:(\d)\s*C:(\d)\]\s*$").unwrap());

/// Extract a `<thinking>…</thinking>` prefix from content. Returns the
/// thinking text (if any) and the content with the block removed.
pub fn extract_thinking(content: &str) -> (Option<String>, String) {
    if let Some(captures) = THINKING_RE.captures(content) {
        let thinking = captures.get(1).map(|m| m.as_str().trim().to_string());
        let remaining = THINKING_RE.replace_all(content, "").trim().to_string();
        return (thinking.filter(|t| !t.is_empty()), remaining);
    }
    (None, content.to_string())
}

/// Parse the trailing `[U:n C:n]` salience tag.
///
/// Rules:
/// - A response starting with "Quiet" (case-insensitive) is a
///   non-contribution; with no tag it counts as `{0,0}`.
/// - Otherwise the tag must sit at the tail (trailing whitespace allowed).
/// - A missing tag yields `None`; `[U:0 C:0]` and a missing tag are
///   equivalent downstream.
///
/// Returns the output with the tag stripped, plus the parsed metadata.
pub fn parse_salience(output: &str) -> (String, Option<SalienceMetadata>) {
    let trimmed = output.trim();

    if trimmed.to_lowercase().starts_with("quiet") {
        if let Some(captures) = SALIENCE_TAG_RE.captures(trimmed) {
            let salience = captures_to_salience(&captures);
            let cleaned = SALIENCE_TAG_RE.replace_all(trimmed, "").trim().to_string();
            return (cleaned, Some(salience));
        }
        return (trimmed.to_string(), Some(SalienceMetadata::new(0, 0)));
    }

    if let Some(captures) = SALIENCE_TAIL_RE.captures(trimmed) {
        let salience = captures_to_salience(&captures);
        let cleaned = SALIENCE_TAIL_RE.replace(trimmed, "").trim().to_string();
        return (cleaned, Some(salience));
    }

    (trimmed.to_string(), None)
}

fn captures_to_salience(captures: &regex::Captures<'_>) -> SalienceMetadata {
    let urgency: u8 = captures[1].parse().unwrap_or(0);
    let confidence: u8 = captures[2].parse().unwrap_or(0);
    SalienceMetadata::new(urgency, confidence)
}

/// Locate the JSON-shaped block in a model response: a ```json fence, a
/// bare ``` fence, or the region from the first `{` to the end (repair
/// pads missing closers later).
pub fn extract_json_block(content: &str) -> Option<String> {
    if let Some(start) = content.find("```json") {
        let rest = &content[start + 7..];
        let end = rest.find("```").unwrap_or(rest.len());
        return Some(rest[..end].trim().to_string());
    }
    if let Some(start) = content.find("```") {
        let rest = &content[start + 3..];
        let end = rest.find("```").unwrap_or(rest.len());
        let block = rest[..end].trim();
        if block.starts_with('{') {
            return Some(block.to_string());
        }
    }
    content
        .find('{')
        .map(|start| content[start..].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thinking_extraction() {
        let (thinking, rest) =
            extract_thinking("<thinking>weighing options</thinking>Looks fine. [U:1 C:2]");
        assert_eq!(thinking.as_deref(), Some("weighing options"));
        assert_eq!(rest, "Looks fine. [U:1 C:2]");
    }

    #[test]
    fn test_no_thinking_passthrough() {
        let (thinking, rest) = extract_thinking("plain output");
        assert!(thinking.is_none());
        assert_eq!(rest, "plain output");
    }

    #[test]
    fn test_tail_tag_parsed_and_stripped() {
        let (output, salience) = parse_salience("User seems strained. [U:2 C:3]  ");
        assert_eq!(output, "User seems strained.");
        assert_eq!(salience, Some(SalienceMetadata::new(2, 3)));
    }

    #[test]
    fn test_missing_tag_is_none() {
        let (output, salience) = parse_salience("User seems strained.");
        assert_eq!(output, "User seems strained.");
        assert!(salience.is_none());
    }

    #[test]
    fn test_quiet_without_tag_is_zero_zero() {
        let (output, salience) = parse_salience("Quiet.");
        assert_eq!(output, "Quiet.");
        assert_eq!(salience, Some(SalienceMetadata::new(0, 0)));
    }

    #[test]
    fn test_quiet_with_tag_keeps_tag_values() {
        let (_, salience) = parse_salience("Quiet. [U:1 C:1]");
        assert_eq!(salience, Some(SalienceMetadata::new(1, 1)));
    }

    #[test]
    fn test_mid_text_tag_is_not_a_tail_tag() {
        let (output, salience) = parse_salience("Noted [U:2 C:2] but more follows.");
        assert!(salience.is_none());
        assert_eq!(output, "Noted [U:2 C:2] but more follows.");
    }

    #[test]
    fn test_tag_values_clamp() {
        let (_, salience) = parse_salience("Alarming. [U:9 C:8]");
        assert_eq!(salience, Some(SalienceMetadata::new(3, 3)));
    }

    #[test]
    fn test_json_block_from_fence() {
        let content = "Here you go:\n```json\n{\"salience\": 0.5}\n```\ndone";
        assert_eq!(extract_json_block(content).unwrap(), "{\"salience\": 0.5}");
    }

    #[test]
    fn test_json_block_from_bare_braces() {
        let content = "prefix {\"salience\": 0.5}";
        assert_eq!(extract_json_block(content).unwrap(), "{\"salience\": 0.5}");
    }

    #[test]
    fn test_no_json_block() {
        assert!(extract_json_block("nothing structured here").is_none());
    }
}
