use murmur_types::StructuredOutput;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

// NOTE: Model JSON is best-effort input. The repair ladder is, in order:
// strip trailing commas, pad missing closers, close an odd trailing
// string, and finally regex extraction of the scalar fields. Nothing in
// this module ever fails; a hopeless block just degrades to defaults.

static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

static UNESCAPED_QUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?:^|[^\\])""#).unwrap());

static OPEN_STRING_TAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*":\s*"[^"]*$"#).unwrap());

static SALIENCE_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""salience"\s*:\s*([0-9.]+)"#).unwrap());

static GLIMPSE_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""glimpse"\s*:\s*"([^"]*)""#).unwrap());

/// Apply the mechanical repair rules to a damaged JSON string.
pub fn repair_json(text: &str) -> String {
    // Trailing commas before } or ].
    let mut repaired = TRAILING_COMMA_RE.replace_all(text, "$1").into_owned();
    repaired.truncate(repaired.trim_end().len());

    // Close an odd unescaped quote at the tail before padding brackets,
    // so the padded closers land outside the string.
    let quote_count = UNESCAPED_QUOTE_RE.find_iter(&repaired).count();
    if quote_count % 2 == 1 && OPEN_STRING_TAIL_RE.is_match(&repaired) {
        repaired.push('"');
    }

    // Pad the minimum closing brackets to balance.
    let open_braces =
        repaired.matches('{').count() as i64 - repaired.matches('}').count() as i64;
    let open_brackets =
        repaired.matches('[').count() as i64 - repaired.matches(']').count() as i64;
    for _ in 0..open_brackets.max(0) {
        repaired.push(']');
    }
    for _ in 0..open_braces.max(0) {
        repaired.push('}');
    }

    repaired
}

/// Fallback: pull named scalar fields out with regexes when parsing fails
/// entirely. Only `salience` and `glimpse` survive this path; claims,
/// hypotheses, and questions require a parsed block.
pub fn extract_json_fields(text: &str) -> StructuredOutput {
    let mut out = StructuredOutput::default();
    if let Some(captures) = SALIENCE_FIELD_RE.captures(text)
        && let Ok(salience) = captures[1].parse::<f64>()
    {
        out.salience = salience;
    }
    if let Some(captures) = GLIMPSE_FIELD_RE.captures(text) {
        out.glimpse = captures[1].to_string();
    }
    out
}

/// Parse a structured block with the full repair ladder. Returns `None`
/// only when there is no JSON-shaped block at all.
pub fn parse_structured(block: Option<String>, agent_id: &str) -> Option<StructuredOutput> {
    let block = block?;

    if let Ok(parsed) = serde_json::from_str::<StructuredOutput>(&block) {
        return Some(parsed);
    }

    let repaired = repair_json(&block);
    if let Ok(parsed) = serde_json::from_str::<StructuredOutput>(&repaired) {
        debug!(agent_id, "structured block repaired");
        return Some(parsed);
    }

    debug!(agent_id, "structured block unparseable, regex fallback");
    Some(extract_json_fields(&block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_commas_removed() {
        let repaired = repair_json(r#"{"a": 1, "b": [1, 2,],}"#);
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["b"][1], 2);
    }

    #[test]
    fn test_missing_closers_padded() {
        let repaired = repair_json(r#"{"a": {"b": [1, 2"#);
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["a"]["b"][0], 1);
    }

    #[test]
    fn test_open_string_closed() {
        let repaired = repair_json(r#"{"glimpse": "an unfinished though"#);
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["glimpse"], "an unfinished though");
    }

    #[test]
    fn test_regex_fallback_extracts_scalars() {
        let out = extract_json_fields(r#"totally { broken "salience": 0.7 :::: "glimpse": "dim" "#);
        assert_eq!(out.salience, 0.7);
        assert_eq!(out.glimpse, "dim");
        assert!(out.claims.is_empty());
    }

    #[test]
    fn test_parse_structured_prefers_clean_parse() {
        let block = r#"{"agent": "self.observer", "salience": 0.3, "glimpse": "ok"}"#;
        let out = parse_structured(Some(block.to_string()), "self.observer").unwrap();
        assert_eq!(out.agent, "self.observer");
        assert_eq!(out.salience, 0.3);
    }

    #[test]
    fn test_parse_structured_repairs_damage() {
        let block = r#"{"salience": 0.4, "claims": [{"text": "should rest", "type": "recommendation", "urgency": 2, "confidence": 2},]"#;
        let out = parse_structured(Some(block.to_string()), "a").unwrap();
        assert_eq!(out.claims.len(), 1);
        assert_eq!(out.claims[0].urgency, 2);
    }

    #[test]
    fn test_parse_structured_none_without_block() {
        assert!(parse_structured(None, "a").is_none());
    }
}
