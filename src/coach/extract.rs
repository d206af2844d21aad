//! Pull a JSON value out of model prose.
//!
//! Models wrap JSON in explanations or code fences. The scanner finds the
//! first balanced `{...}` or `[...]`, ignoring brackets inside string
//! literals, and hands exactly that slice to serde.

use serde::de::DeserializeOwned;

/// First balanced span starting with `open`.
pub fn balanced_span(text: &str, open: char) -> Option<&str> {
    let close = match open {
        '{' => '}',
        '[' => ']',
        _ => return None,
    };
    let start = text.find(open)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode the first balanced object in `text`.
pub fn object<T: DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_str(balanced_span(text, '{')?).ok()
}

/// Decode the first balanced array in `text`.
pub fn array<T: DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_str(balanced_span(text, '[')?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn finds_object_inside_prose_and_fences() {
        let text = "Sure! Here you go:\n```json\n{\"ok\": true, \"friendly\": \"Thank you.\"}\n```\nAnything else?";
        let value: Value = object(text).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let text = r#"{"friendly": "use {curly} and \"quotes\"", "ok": false} trailing }"#;
        assert_eq!(
            balanced_span(text, '{'),
            Some(r#"{"friendly": "use {curly} and \"quotes\"", "ok": false}"#)
        );
    }

    #[test]
    fn stops_at_first_balanced_object() {
        let text = r#"first {"a": {"b": 1}} second {"c": 2}"#;
        let value: Value = object(text).unwrap();
        assert_eq!(value["a"]["b"], 1);
        assert!(value.get("c").is_none());
    }

    #[test]
    fn arrays_and_missing_spans() {
        let list: Vec<String> = array("Examples: [\"Open deals\", \"Tasks due\"]").unwrap();
        assert_eq!(list, vec!["Open deals", "Tasks due"]);
        assert!(object::<Value>("no json here").is_none());
        assert!(object::<Value>("{\"unterminated\": true").is_none());
    }
}
