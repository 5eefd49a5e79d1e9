#![forbid(unsafe_code)]

//! `%(keyPath)s` string patterns evaluated against a key-value cursor.
//!
//! Supported tokens:
//!
//! | Token | Output |
//! |-------|--------|
//! | `%(a.b)s` | string form of the key path, empty when null |
//! | `%(a.b)i`, `%(a.b)d` | integer coercion of the key path |
//! | `%%` | a literal `%` |
//!
//! Anything else that starts with `%` (an unclosed `(`, an unknown format
//! character, a trailing `%`) is copied through verbatim.

use crate::kvc::{value_for_key_path, KeyValueCoding};

/// Single-pass substitution of `%(keyPath)s` tokens.
pub fn format(pattern: &str, cursor: &dyn KeyValueCoding) -> String {
    if !pattern.contains('%') {
        return pattern.to_owned();
    }

    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;

    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx + 1..];

        if let Some(after) = tail.strip_prefix('%') {
            out.push('%');
            rest = after;
            continue;
        }

        match parse_token(tail) {
            Some((key, conversion, consumed)) => {
                let value = value_for_key_path(cursor, key);
                match conversion {
                    'i' | 'd' => out.push_str(&value.int_value().to_string()),
                    _ => out.push_str(&value.string_value().unwrap_or_default()),
                }
                rest = &tail[consumed..];
            }
            None => {
                out.push('%');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse `(key)c` at the start of `s`; returns the key, the conversion
/// character and the number of bytes consumed.
fn parse_token(s: &str) -> Option<(&str, char, usize)> {
    let inner = s.strip_prefix('(')?;
    let close = inner.find(')')?;
    let key = &inner[..close];
    if key.is_empty() {
        return None;
    }
    let conversion = inner[close + 1..].chars().next()?;
    if !matches!(conversion, 's' | 'i' | 'd') {
        return None;
    }
    Some((key, conversion, 1 + close + 1 + conversion.len_utf8()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::kvc::Record;
    use crate::value::Value;

    fn cursor() -> Record {
        let address = Arc::new(Record::new("address").with("city", "Leipzig"));
        Record::new("cursor")
            .with("name", "Ann")
            .with("age", 41)
            .with("address", Value::object(address))
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(format("no tokens here", &cursor()), "no tokens here");
    }

    #[test]
    fn substitutes_key_paths() {
        assert_eq!(
            format("%(name)s lives in %(address.city)s", &cursor()),
            "Ann lives in Leipzig"
        );
        assert_eq!(format("age=%(age)i", &cursor()), "age=41");
    }

    #[test]
    fn missing_keys_become_empty() {
        assert_eq!(format("[%(nope)s]", &cursor()), "[]");
        assert_eq!(format("[%(nope)d]", &cursor()), "[0]");
    }

    #[test]
    fn escapes_and_malformed_tokens() {
        assert_eq!(format("100%% of %(name)s", &cursor()), "100% of Ann");
        assert_eq!(format("50% off", &cursor()), "50% off");
        assert_eq!(format("%(name", &cursor()), "%(name");
        assert_eq!(format("%(name)x", &cursor()), "%(name)x");
        assert_eq!(format("trailing %", &cursor()), "trailing %");
        assert_eq!(format("%()s", &cursor()), "%()s");
    }
}
