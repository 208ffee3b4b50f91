//! Relaxed JSON acceptance for the query surface.
//!
//! Users paste Mongo-shell style expressions: unquoted keys (`$match`,
//! `subject.subject_id`), single-quoted strings, trailing commas. Strict
//! JSON is tried first; on failure the input is normalized to strict JSON
//! and parsed again.

use metatools_core::{MetaError, Result};
use serde_json::Value;

/// Parse a query expression, accepting relaxed Mongo-shell syntax.
pub fn parse_relaxed(input: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str(input) {
        return Ok(value);
    }
    let normalized = normalize(input);
    serde_json::from_str(&normalized)
        .map_err(|e| MetaError::Query(format!("invalid query expression: {}", e)))
}

fn is_bare_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_bare_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
}

/// Rewrite relaxed syntax into strict JSON. Three transformations only:
/// single-quoted strings become double-quoted, bare words followed by `:`
/// are quoted as keys, and commas directly before a closing bracket are
/// dropped. `true`/`false`/`null` pass through untouched.
fn normalize(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let quote = c;
                out.push('"');
                i += 1;
                while i < chars.len() {
                    let s = chars[i];
                    if s == '\\' && i + 1 < chars.len() {
                        let next = chars[i + 1];
                        if quote == '\'' && next == '\'' {
                            out.push('\'');
                        } else {
                            out.push('\\');
                            out.push(next);
                        }
                        i += 2;
                        continue;
                    }
                    if s == quote {
                        i += 1;
                        break;
                    }
                    if s == '"' && quote == '\'' {
                        out.push_str("\\\"");
                    } else {
                        out.push(s);
                    }
                    i += 1;
                }
                out.push('"');
            }
            ',' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                    // trailing comma, drop it
                    i += 1;
                } else {
                    out.push(',');
                    i += 1;
                }
            }
            c if is_bare_start(c) => {
                let start = i;
                while i < chars.len() && is_bare_continue(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                let is_key = j < chars.len() && chars[j] == ':';
                if is_key {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else {
                    // literal (true/false/null) or a bare value the strict
                    // parser will reject
                    out.push_str(&word);
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_json_passes_through() {
        let value = parse_relaxed(r#"[{"$match": {"a": 1}}]"#).unwrap();
        assert_eq!(value, json!([{"$match": {"a": 1}}]));
    }

    #[test]
    fn unquoted_keys_are_accepted() {
        let value = parse_relaxed(r#"{$match: {subject.subject_id: "12345"}}"#).unwrap();
        assert_eq!(value, json!({"$match": {"subject.subject_id": "12345"}}));
    }

    #[test]
    fn single_quoted_strings_are_accepted() {
        let value = parse_relaxed(r#"{'name': 'behavior_12345'}"#).unwrap();
        assert_eq!(value, json!({"name": "behavior_12345"}));
    }

    #[test]
    fn trailing_commas_are_dropped() {
        let value = parse_relaxed(r#"[{"$limit": 5,},]"#).unwrap();
        assert_eq!(value, json!([{"$limit": 5}]));
    }

    #[test]
    fn mixed_relaxations_in_one_expression() {
        let value =
            parse_relaxed(r#"[{$match: {modality: 'fib',}}, {$limit: 10},]"#).unwrap();
        assert_eq!(
            value,
            json!([{"$match": {"modality": "fib"}}, {"$limit": 10}])
        );
    }

    #[test]
    fn literals_survive_normalization() {
        let value = parse_relaxed(r#"{flag: true, missing: null,}"#).unwrap();
        assert_eq!(value, json!({"flag": true, "missing": null}));
    }

    #[test]
    fn quoted_content_is_not_rewritten() {
        let value = parse_relaxed(r#"{note: "keep: 'this', intact,"}"#).unwrap();
        assert_eq!(value, json!({"note": "keep: 'this', intact,"}));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_relaxed("{{{{").is_err());
        assert!(parse_relaxed("").is_err());
    }
}
