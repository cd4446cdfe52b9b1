//! Reversible escaping of document field names.
//!
//! Document stores reject `.` and `$` in field names. Keys are escaped with
//! `~` as the escape character:
//!
//! | literal | escaped |
//! |---------|---------|
//! | `~`     | `~~`    |
//! | `.`     | `~p`    |
//! | `$`     | `~d`    |
//!
//! Unescaping is a single left-to-right scan, so any string round-trips,
//! including ones that already contain `~d` or `~p` literally. Only object
//! keys change; array order, nesting and values are left alone.

use serde_json::{Map, Value};

pub fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '~' => out.push_str("~~"),
            '.' => out.push_str("~p"),
            '$' => out.push_str("~d"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse of [`escape_key`]. A `~` not followed by `~`, `p` or `d` never
/// comes out of `escape_key` and is kept verbatim.
pub fn unescape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('~') => out.push('~'),
            Some('p') => out.push('.'),
            Some('d') => out.push('$'),
            _ => {
                out.push('~');
                continue;
            }
        }
        chars.next();
    }
    out
}

/// Escape every object key in `value`, recursively.
pub fn escape_keys(value: Value) -> Value {
    change_keys(value, &escape_key)
}

/// Unescape every object key in `value`, recursively.
pub fn unescape_keys(value: Value) -> Value {
    change_keys(value, &unescape_key)
}

fn change_keys(value: Value, convert: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (convert(&k), change_keys(v, convert)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| change_keys(v, convert)).collect()),
        scalar => scalar,
    }
}
