//! Salvages a JSON payload from raw generative-model text. The text is at
//! best "mostly JSON": often wrapped in fenced code blocks, sometimes
//! prefixed with prose, sometimes cut short by an output-length limit. The
//! recovery pipeline maximizes how many complete records survive instead of
//! rejecting the whole response for one dangling fragment.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::layout::{PlacedObject, RoomLayout};

/// Which top-level JSON shape the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedShape {
    Array,
    Object,
}

impl ExpectedShape {
    fn brackets(self) -> (char, char) {
        match self {
            Self::Array => ('[', ']'),
            Self::Object => ('{', '}'),
        }
    }
}

impl fmt::Display for ExpectedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array => f.write_str("array"),
            Self::Object => f.write_str("object"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RecoverError {
    /// Every repair strategy failed. The cleaned text is retained so the
    /// caller can log or display what was actually attempted.
    #[error("no recoverable JSON {expected} in model output")]
    UnrecoverableFormat {
        expected: ExpectedShape,
        cleaned: String,
    },

    /// The payload parsed as JSON but does not match the layout schema.
    #[error("recovered JSON does not describe a {expected}: {source}")]
    Schema {
        expected: ExpectedShape,
        source: serde_json::Error,
    },
}

/// Recovers a room layout from raw model text.
pub fn recover_layout(raw: &str) -> Result<RoomLayout, RecoverError> {
    let value = recover(raw, ExpectedShape::Array)?;
    serde_json::from_value(value).map_err(|source| RecoverError::Schema {
        expected: ExpectedShape::Array,
        source,
    })
}

/// Recovers a single placed object, e.g. one furniture item.
pub fn recover_object(raw: &str) -> Result<PlacedObject, RecoverError> {
    let value = recover(raw, ExpectedShape::Object)?;
    serde_json::from_value(value).map_err(|source| RecoverError::Schema {
        expected: ExpectedShape::Object,
        source,
    })
}

/// Extracts and repairs one JSON value of the expected shape from noisy or
/// truncated text. Repair attempts are ordered; the first success wins.
pub fn recover(raw: &str, shape: ExpectedShape) -> Result<Value, RecoverError> {
    let cleaned = strip_noise(raw);
    let (open, close) = shape.brackets();

    let unrecoverable = |cleaned: String| RecoverError::UnrecoverableFormat {
        expected: shape,
        cleaned,
    };

    let Some(start) = cleaned.find(open) else {
        return Err(unrecoverable(cleaned));
    };

    // Well-delimited span first; otherwise the text was cut mid-generation
    // and the tail has to be rebuilt from the last complete element.
    let candidate = match cleaned.rfind(close) {
        Some(end) if end > start => cleaned[start..=end].to_owned(),
        _ => {
            let tail = &cleaned[start..];
            match close_truncated(tail, shape, true)
                .or_else(|| close_truncated(tail, shape, false))
            {
                Some(repaired) => repaired,
                None => return Err(unrecoverable(cleaned)),
            }
        }
    };

    let candidate = normalize_trailing_commas(&candidate);
    if let Ok(value) = serde_json::from_str(&candidate) {
        return Ok(value);
    }

    // The span sliced cleanly but still does not parse, typically because
    // the last closing bracket belonged to a nested value. Fall back to the
    // last fully closed object and re-close the outer shape.
    if let Some(repaired) = close_truncated(&candidate, shape, false) {
        let repaired = normalize_trailing_commas(&repaired);
        if let Ok(value) = serde_json::from_str(&repaired) {
            return Ok(value);
        }
    }

    Err(unrecoverable(cleaned))
}

/// Removes fenced code-block markers and comment-like tokens anywhere in the
/// text. Comment stripping is line- and span-based, not string-aware, which
/// matches how the generators actually misuse comments (outside values).
fn strip_noise(raw: &str) -> String {
    let mut text = raw.replace("```json", "\n").replace("```", "\n");

    while let Some(start) = text.find("/*") {
        match text[start..].find("*/") {
            Some(rel_end) => text.replace_range(start..start + rel_end + 2, ""),
            None => {
                text.truncate(start);
                break;
            }
        }
    }

    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        match line.find("//") {
            Some(pos) => out.push_str(&line[..pos]),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out.trim().to_owned()
}

/// Rebuilds a truncated payload: cut back to the last complete-element
/// boundary and synthesize every missing closer. `strict` demands a `},`
/// boundary for arrays (an element followed by more truncated data); the
/// relaxed pass settles for any closed object.
fn close_truncated(text: &str, shape: ExpectedShape, strict: bool) -> Option<String> {
    let boundary = match (shape, strict) {
        (ExpectedShape::Array, true) => text.rfind("},"),
        _ => text.rfind('}'),
    }?;

    let mut repaired = text[..=boundary].to_owned();
    for closer in unclosed_brackets(&repaired) {
        repaired.push(closer);
    }
    Some(repaired)
}

/// Closers still owed by `text`, innermost first. String contents are
/// skipped so bracket characters inside values do not count.
fn unclosed_brackets(text: &str) -> Vec<char> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    stack.reverse();
    stack
}

/// Drops any comma whose next non-whitespace character closes a bracket or
/// brace. Both truncation repair and generator noise leave these behind.
/// String contents are skipped so a literal `", ]"` inside a value survives.
fn normalize_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => in_string = true,
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_formed_round_trip() {
        let layout = RoomLayout {
            objects: vec![PlacedObject {
                name: "Desk".into(),
                x: 4.0,
                z: 6.0,
                color: "8B4513".into(),
                components: vec![],
            }],
        };
        let raw = serde_json::to_string(&layout).unwrap();
        let recovered = recover_layout(&raw).unwrap();
        assert_eq!(recovered, layout);
    }

    #[test]
    fn truncated_array_keeps_complete_elements() {
        let raw = r#"[{"a":1},{"a":2},{"a"#;
        let value = recover(raw, ExpectedShape::Array).unwrap();
        assert_eq!(value, json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn fenced_with_trailing_comma() {
        let raw = "```json\n[{\"a\":1},]\n```";
        let value = recover(raw, ExpectedShape::Array).unwrap();
        assert_eq!(value, json!([{"a": 1}]));
    }

    #[test]
    fn comma_inside_string_survives() {
        let raw = r#"[{"name":"Sofa, ]long[","a":1},]"#;
        let value = recover(raw, ExpectedShape::Array).unwrap();
        assert_eq!(value, json!([{"name": "Sofa, ]long[", "a": 1}]));
    }

    #[test]
    fn prose_prefix_is_ignored() {
        let raw = "Here is the layout you asked for:\n[{\"a\":1}]\nLet me know!";
        let value = recover(raw, ExpectedShape::Array).unwrap();
        assert_eq!(value, json!([{"a": 1}]));
    }

    #[test]
    fn comments_are_stripped() {
        let raw = "[/* the sofa */{\"a\":1}, // second\n{\"a\":2}]";
        let value = recover(raw, ExpectedShape::Array).unwrap();
        assert_eq!(value, json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn no_opening_bracket_is_unrecoverable() {
        let err = recover("the model refused to answer", ExpectedShape::Array).unwrap_err();
        match err {
            RecoverError::UnrecoverableFormat { expected, cleaned } => {
                assert_eq!(expected, ExpectedShape::Array);
                assert!(cleaned.contains("refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncated_single_object() {
        let raw = r#"{"name":"Lamp","specs":{"w":1},"price"#;
        let value = recover(raw, ExpectedShape::Object).unwrap();
        assert_eq!(value, json!({"name": "Lamp", "specs": {"w": 1}}));
    }

    #[test]
    fn truncated_between_nested_elements() {
        let raw = r#"[{"a":{"x":1}},{"a":{"x":2}"#;
        let value = recover(raw, ExpectedShape::Array).unwrap();
        assert_eq!(value, json!([{"a": {"x": 1}}]));
    }

    #[test]
    fn unbalanced_span_retries_from_last_closed_object() {
        // The last `]` belongs to a nested array, so the first slice is
        // unbalanced and the second repair pass re-closes the outer array.
        let raw = r#"[{"a":1},{"b":[1,2]"#;
        let value = recover(raw, ExpectedShape::Array).unwrap();
        assert_eq!(value, json!([{"a": 1}]));
    }

    #[test]
    fn single_element_array_without_closer() {
        let raw = r#"[{"a":1}"#;
        let value = recover(raw, ExpectedShape::Array).unwrap();
        assert_eq!(value, json!([{"a": 1}]));
    }

    #[test]
    fn schema_mismatch_is_reported() {
        let err = recover_layout("[1,2,3]").unwrap_err();
        assert!(matches!(err, RecoverError::Schema { .. }));
    }
}
