//! Request body normalization.
//!
//! Turns a JSON object (`text`, then `content`) or a raw text body into the
//! string forwarded upstream. Parsing is permissive: malformed JSON is treated
//! like an object without either field, never as a hard error.
use serde_json::Value;

/// Normalized payload forwarded to the extractor, untrimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText(String);

impl InboundText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// The request carried no usable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no text provided")]
pub struct NoTextProvided;

/// Whether a `Content-Type` value declares a JSON body: `application/json` or
/// any `application/*+json`, ignoring parameters and case.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Extract the text payload from a request body.
pub fn normalize(content_type: Option<&str>, body: &[u8]) -> Result<InboundText, NoTextProvided> {
    let candidate = if is_json_content_type(content_type) {
        text_from_json(body)
    } else {
        Some(String::from_utf8_lossy(body).into_owned())
    };

    match candidate {
        Some(text) if !text.trim().is_empty() => Ok(InboundText(text)),
        _ => Err(NoTextProvided),
    }
}

fn text_from_json(body: &[u8]) -> Option<String> {
    let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
        return None;
    };

    // `text` wins whenever it is a non-empty string, even if only whitespace.
    ["text", "content"]
        .into_iter()
        .filter_map(|name| fields.get(name).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: Option<&str> = Some("application/json");
    const TEXT: Option<&str> = Some("text/plain");

    #[test]
    fn test_json_and_raw_agree() {
        let from_json = normalize(JSON, br#"{"text": "x"}"#).unwrap();
        let from_raw = normalize(TEXT, b"x").unwrap();
        assert_eq!(from_json, from_raw);
        assert_eq!(from_json.as_str(), "x");
    }

    #[test]
    fn test_text_wins_over_content() {
        let text = normalize(JSON, br#"{"text": "a", "content": "b"}"#).unwrap();
        assert_eq!(text.as_str(), "a");
    }

    #[test]
    fn test_content_fallback() {
        assert_eq!(normalize(JSON, br#"{"content": "b"}"#).unwrap().as_str(), "b");
        assert_eq!(
            normalize(JSON, br#"{"text": "", "content": "b"}"#).unwrap().as_str(),
            "b"
        );
        assert_eq!(
            normalize(JSON, br#"{"text": 42, "content": "b"}"#).unwrap().as_str(),
            "b"
        );
    }

    #[test]
    fn test_whitespace_text_does_not_fall_back() {
        assert_eq!(
            normalize(JSON, br#"{"text": "   ", "content": "b"}"#),
            Err(NoTextProvided)
        );
    }

    #[test]
    fn test_empty_inputs_fail_for_every_content_type() {
        assert_eq!(normalize(JSON, b"{}"), Err(NoTextProvided));
        assert_eq!(normalize(JSON, br#"{"text": "   \n\t   "}"#), Err(NoTextProvided));
        assert_eq!(normalize(TEXT, b""), Err(NoTextProvided));
        assert_eq!(normalize(TEXT, b" \r\n "), Err(NoTextProvided));
        assert_eq!(normalize(None, b""), Err(NoTextProvided));
    }

    #[test]
    fn test_malformed_json_is_treated_as_empty_object() {
        assert_eq!(normalize(JSON, b"{not json"), Err(NoTextProvided));
        assert_eq!(normalize(JSON, br#"["text"]"#), Err(NoTextProvided));
        assert_eq!(normalize(JSON, b"null"), Err(NoTextProvided));
    }

    #[test]
    fn test_success_keeps_surrounding_whitespace() {
        let text = normalize(TEXT, b"  The quick\n\tbrown fox  ").unwrap();
        assert_eq!(text.into_inner(), "  The quick\n\tbrown fox  ");
    }

    #[test]
    fn test_raw_body_decoding_is_lossy() {
        let text = normalize(None, b"caf\xff").unwrap();
        assert_eq!(text.as_str(), "caf\u{fffd}");
    }

    #[test]
    fn test_json_detection() {
        assert!(is_json_content_type(Some("application/json")));
        assert!(is_json_content_type(Some("Application/JSON; charset=utf-8")));
        assert!(is_json_content_type(Some("application/merge-patch+json")));
        assert!(!is_json_content_type(Some("text/json")));
        assert!(!is_json_content_type(Some("text/plain")));
        assert!(!is_json_content_type(None));
    }

    #[test]
    fn test_json_looking_body_without_json_content_type_is_raw() {
        let text = normalize(TEXT, br#"{"text": "a"}"#).unwrap();
        assert_eq!(text.as_str(), r#"{"text": "a"}"#);
    }
}
