//! Canonical JSON serialization (RFC 8785 flavor).
//!
//! Token hashing and the on-disk line format both depend on one property:
//! the same logical JSON data must always produce the same bytes, across
//! runs and across interoperating implementations. This module provides
//! that canonical form — lexicographically sorted object keys, no
//! insignificant whitespace, stable string escaping, and ECMAScript-style
//! number text.

use std::fmt::Write;

use serde_json::Value;

use crate::errors::{TibetError, TibetResult};

/// Render a JSON value in canonical form.
pub fn canonical_json(value: &Value) -> TibetResult<String> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut String) -> TibetResult<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out)?,
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(&map[*key], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_control() => {
                // write! into a String cannot fail
                let _ = write!(out, "\\u{:04x}", ch as u32);
            }
            ch => out.push(ch),
        }
    }
    out.push('"');
}

fn write_number(n: &serde_json::Number, out: &mut String) -> TibetResult<()> {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{i}");
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{u}");
    } else if let Some(f) = n.as_f64() {
        if !f.is_finite() {
            return Err(TibetError::encoding(
                "non-finite number cannot be canonicalized",
            ));
        }
        // Whole floats collapse to their integer text, matching
        // ECMAScript Number.prototype.toString for the common range.
        if f.fract() == 0.0 && f.abs() < 1e15 {
            let _ = write!(out, "{}", f as i64);
        } else {
            let _ = write!(out, "{f}");
        }
    } else {
        return Err(TibetError::encoding("unsupported number representation"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted() {
        let value = json!({"z": 1, "a": 2, "m": 3});
        assert_eq!(canonical_json(&value).unwrap(), r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn nesting_sorts_at_every_level() {
        let value = json!({"outer": {"z": 1, "a": {"c": 3, "b": 2}}, "first": 1});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"first":1,"outer":{"a":{"b":2,"c":3},"z":1}}"#
        );
    }

    #[test]
    fn arrays_keep_their_order() {
        let value = json!({"array": [3, 1, 2], "refs": ["z", "a"]});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"array":[3,1,2],"refs":["z","a"]}"#
        );
    }

    #[test]
    fn whole_floats_collapse_to_integers() {
        let value = json!({"float": 3.14, "int": 42, "whole": 5.0, "zero": 0.0});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"float":3.14,"int":42,"whole":5,"zero":0}"#
        );
    }

    #[test]
    fn strings_escape_stably() {
        let value = json!({"q": "he said \"hi\"", "path": "a\\b", "nl": "x\ny"});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"nl":"x\ny","path":"a\\b","q":"he said \"hi\""}"#
        );
    }

    #[test]
    fn repeated_runs_are_identical() {
        let value = json!({"z": {"b": 2, "a": 1}, "a": [3, 1, 2], "m": null});
        let first = canonical_json(&value).unwrap();
        let second = canonical_json(&value).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, r#"{"a":[3,1,2],"m":null,"z":{"a":1,"b":2}}"#);
    }
}
