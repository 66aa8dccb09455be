//! Property ↔ data-attribute encoding for hydration wrappers.
//!
//! Values carry an explicit type tag so the browser never has to guess:
//!
//! | tag  | value                         |
//! |------|-------------------------------|
//! | `s:` | string, verbatim              |
//! | `n:` | number                        |
//! | `b:` | `true` / `false`              |
//! | `j:` | JSON (arrays, objects, null)  |
//!
//! Untagged values (hand-written markup) fall back to inspection: empty or
//! `"true"` is `true`, `"false"` is `false`, numeric text is a number,
//! bracketed JSON is parsed, anything else stays a string. The browser
//! runtime implements the same decoder.

use serde_json::{Map, Value};

use crate::eval::number;

pub const DATA_PREFIX: &str = "data-";

/// `startValue` → `start-value`.
pub fn to_kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `start-value` → `startValue`. Only a lowercase letter or digit after a
/// dash is folded; any other dash is kept, matching the browser runtime.
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(&next) if c == '-' && (next.is_ascii_lowercase() || next.is_ascii_digit()) => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

pub fn encode_attribute(value: &Value) -> String {
    match value {
        Value::String(s) => format!("s:{}", s),
        Value::Number(n) => format!("n:{}", n),
        Value::Bool(b) => format!("b:{}", b),
        other => format!("j:{}", other),
    }
}

pub fn decode_attribute(raw: &str) -> Value {
    if let Some((tag, rest)) = raw.split_once(':') {
        match tag {
            "s" => return Value::String(rest.to_string()),
            "n" => {
                if let Ok(n) = rest.parse::<f64>() {
                    return number(n);
                }
            }
            "b" if rest == "true" || rest == "false" => return Value::Bool(rest == "true"),
            "j" => {
                if let Ok(parsed) = serde_json::from_str(rest) {
                    return parsed;
                }
            }
            _ => {}
        }
    }
    cast_untagged(raw)
}

fn cast_untagged(raw: &str) -> Value {
    match raw {
        "" | "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.trim().parse::<f64>() {
        if n.is_finite() {
            return number(n);
        }
    }
    if raw.starts_with('{') || raw.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str(raw) {
            return parsed;
        }
    }
    Value::String(raw.to_string())
}

/// `data-*` attribute pairs for a property object.
pub fn encode_props(props: &Map<String, Value>) -> Vec<(String, String)> {
    props
        .iter()
        .map(|(key, value)| {
            (
                format!("{}{}", DATA_PREFIX, to_kebab_case(key)),
                encode_attribute(value),
            )
        })
        .collect()
}

/// Inverse of [`encode_props`]; non-`data-*` attributes are ignored.
pub fn decode_props<'a>(attrs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Map<String, Value> {
    attrs
        .into_iter()
        .filter_map(|(name, raw)| {
            name.strip_prefix(DATA_PREFIX)
                .map(|key| (to_camel_case(key), decode_attribute(raw)))
        })
        .collect()
}
