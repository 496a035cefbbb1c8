//! Parser for inline `key=val[,key=val...]` overrides.
//!
//! Keys are dotted paths (`a.b.c`) and may index lists (`a[0].b`). Intermediate maps
//! and lists are created as needed. `\,` `\.` `\=` and `\[` escape their separator.
//! A `{x,y}` value is a list.

use convoy_types::Values;
use serde_json::Value;
use thiserror::Error;

/// Largest list index accepted in a key.
pub const MAX_INDEX: usize = 65536;

/// How the value side of an assignment is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTyping {
    /// `true`/`false`, `null` and integers become typed values; everything else is a string.
    Structured,
    /// Every value is a string.
    ForcedString,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrvalsError {
    #[error("key {key:?} has no value")]
    MissingValue { key: String },

    #[error("key {key:?} has an empty path segment")]
    EmptySegment { key: String },

    #[error("key {key:?} has an invalid list index")]
    BadIndex { key: String },

    #[error("list index {index} in key {key:?} is larger than 65536")]
    IndexTooLarge { key: String, index: usize },

    #[error("list value for key {key:?} is missing its closing brace")]
    UnterminatedList { key: String },
}

/// One path component: a map key and any list indexes that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub indexes: Vec<usize>,
}

/// A parsed `key=value` pair. The value is kept raw until typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub key: String,
    pub path: Vec<Segment>,
    raw_value: String,
}

impl Assignment {
    /// The value with escapes removed and no typing applied.
    pub fn raw_value(&self) -> String {
        unescape(&self.raw_value)
    }

    pub fn value(&self, typing: ValueTyping) -> Result<Value, StrvalsError> {
        let raw = self.raw_value.as_str();
        if raw.starts_with('{') {
            if raw.len() < 2 || !raw.ends_with('}') || raw.ends_with("\\}") {
                return Err(StrvalsError::UnterminatedList {
                    key: self.key.clone(),
                });
            }
            let inner = &raw[1..raw.len() - 1];
            if inner.is_empty() {
                return Ok(Value::Array(vec![]));
            }
            let items = split_unescaped(inner, ',', false)
                .into_iter()
                .map(|item| scalar(&unescape(item), typing))
                .collect();
            return Ok(Value::Array(items));
        }
        Ok(scalar(&unescape(raw), typing))
    }
}

/// Split an override string into its assignments without applying them.
pub fn parse_assignments(input: &str) -> Result<Vec<Assignment>, StrvalsError> {
    let mut out = Vec::new();
    for part in split_unescaped(input, ',', true) {
        if part.is_empty() {
            continue;
        }
        let Some((key_raw, value_raw)) = split_once_unescaped(part, '=') else {
            return Err(StrvalsError::MissingValue {
                key: unescape(part),
            });
        };

        let mut path = Vec::new();
        for segment in split_unescaped(key_raw, '.', false) {
            path.push(parse_segment(segment, key_raw)?);
        }

        out.push(Assignment {
            key: key_raw.to_string(),
            path,
            raw_value: value_raw.to_string(),
        });
    }
    Ok(out)
}

/// Parse `input` and write every assignment into `dest`. Later assignments win.
pub fn parse_into(input: &str, typing: ValueTyping, dest: &mut Values) -> Result<(), StrvalsError> {
    for assignment in parse_assignments(input)? {
        let value = assignment.value(typing)?;
        set_path(dest, &assignment.path, value);
    }
    Ok(())
}

/// Write `value` at `path`, creating intermediate maps and lists.
///
/// A `null` written to a map key removes that key.
pub fn set_path(dest: &mut Values, path: &[Segment], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if first.indexes.is_empty() && rest.is_empty() {
        if value.is_null() {
            dest.remove(&first.name);
        } else {
            dest.insert(first.name.clone(), value);
        }
        return;
    }
    let slot = dest.entry(first.name.clone()).or_insert(Value::Null);
    set_slot(slot, &first.indexes, rest, value);
}

fn set_slot(slot: &mut Value, indexes: &[usize], rest: &[Segment], value: Value) {
    if let Some((&index, more)) = indexes.split_first() {
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            set_slot(&mut items[index], more, rest, value);
        }
        return;
    }
    if rest.is_empty() {
        *slot = value;
        return;
    }
    if !slot.is_object() {
        *slot = Value::Object(Values::new());
    }
    if let Value::Object(map) = slot {
        set_path(map, rest, value);
    }
}

fn parse_segment(raw: &str, key: &str) -> Result<Segment, StrvalsError> {
    let (name_raw, mut rest) = match find_unescaped(raw, '[') {
        Some(i) => (&raw[..i], &raw[i..]),
        None => (raw, ""),
    };
    let name = unescape(name_raw);
    if name.is_empty() {
        return Err(StrvalsError::EmptySegment {
            key: key.to_string(),
        });
    }

    let bad_index = || StrvalsError::BadIndex {
        key: key.to_string(),
    };
    let mut indexes = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[').ok_or_else(bad_index)?;
        let close = inner.find(']').ok_or_else(bad_index)?;
        let index: usize = inner[..close].trim().parse().map_err(|_| bad_index())?;
        if index > MAX_INDEX {
            return Err(StrvalsError::IndexTooLarge {
                key: key.to_string(),
                index,
            });
        }
        indexes.push(index);
        rest = &inner[close + 1..];
    }

    Ok(Segment { name, indexes })
}

fn scalar(s: &str, typing: ValueTyping) -> Value {
    match typing {
        ValueTyping::ForcedString => Value::String(s.to_string()),
        ValueTyping::Structured => typed(s),
    }
}

fn typed(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if s.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if s == "0" {
        return Value::from(0i64);
    }
    // Leading zeros stay strings ("0755", "007").
    if !s.starts_with('0')
        && let Ok(n) = s.parse::<i64>()
    {
        return Value::from(n);
    }
    Value::String(s.to_string())
}

/// Split on `sep` where it is not escaped and, when `braces` is set, not inside `{...}`.
/// Escapes are preserved in the returned slices.
fn split_unescaped(input: &str, sep: char, braces: bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    let mut depth = 0usize;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' if braces => depth += 1,
            '}' if braces && depth > 0 => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn find_unescaped(input: &str, needle: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == needle {
            return Some(i);
        }
    }
    None
}

fn split_once_unescaped(input: &str, sep: char) -> Option<(&str, &str)> {
    find_unescaped(input, sep).map(|i| (&input[..i], &input[i + sep.len_utf8()..]))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next().unwrap_or('\\'));
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(input: &str, typing: ValueTyping) -> Value {
        let mut dest = Values::new();
        parse_into(input, typing, &mut dest).expect("parse");
        Value::Object(dest)
    }

    #[test]
    fn single_assignment() {
        assert_eq!(parse("name=value", ValueTyping::Structured), json!({"name": "value"}));
    }

    #[test]
    fn comma_separates_assignments() {
        assert_eq!(
            parse("a=1,b=two", ValueTyping::Structured),
            json!({"a": 1, "b": "two"})
        );
    }

    #[test]
    fn dotted_keys_create_nested_maps() {
        assert_eq!(
            parse("outer.inner.leaf=x,outer.other=y", ValueTyping::Structured),
            json!({"outer": {"inner": {"leaf": "x"}, "other": "y"}})
        );
    }

    #[test]
    fn structured_values_are_typed() {
        assert_eq!(
            parse("a=true,b=FALSE,c=42,d=-7,e=0,f=0755,g=1.5", ValueTyping::Structured),
            json!({"a": true, "b": false, "c": 42, "d": -7, "e": 0, "f": "0755", "g": "1.5"})
        );
    }

    #[test]
    fn forced_string_values_stay_strings() {
        assert_eq!(
            parse("replicas=3,enabled=true,gone=null", ValueTyping::ForcedString),
            json!({"replicas": "3", "enabled": "true", "gone": "null"})
        );
    }

    #[test]
    fn null_removes_key() {
        let mut dest = Values::new();
        parse_into("a=1,b=2", ValueTyping::Structured, &mut dest).unwrap();
        parse_into("a=null", ValueTyping::Structured, &mut dest).unwrap();
        assert_eq!(Value::Object(dest), json!({"b": 2}));
    }

    #[test]
    fn later_assignment_wins_within_one_string() {
        assert_eq!(parse("a=1,a=2", ValueTyping::Structured), json!({"a": 2}));
    }

    #[test]
    fn list_values_in_braces() {
        assert_eq!(
            parse("hosts={a.example,b.example},ports={80,443},empty={}", ValueTyping::Structured),
            json!({"hosts": ["a.example", "b.example"], "ports": [80, 443], "empty": []})
        );
    }

    #[test]
    fn list_indexes_pad_with_null() {
        assert_eq!(
            parse("servers[2].port=80,servers[0].name=a", ValueTyping::Structured),
            json!({"servers": [{"name": "a"}, null, {"port": 80}]})
        );
    }

    #[test]
    fn nested_list_indexes() {
        assert_eq!(
            parse("m[0][1]=x", ValueTyping::Structured),
            json!({"m": [[null, "x"]]})
        );
    }

    #[test]
    fn escapes_keep_separators_literal() {
        assert_eq!(
            parse(r"name=a\,b,dotted\.key=v,eq=x\=y", ValueTyping::Structured),
            json!({"name": "a,b", "dotted.key": "v", "eq": "x=y"})
        );
    }

    #[test]
    fn value_may_contain_equals_after_first() {
        assert_eq!(
            parse("args=--flag=on", ValueTyping::Structured),
            json!({"args": "--flag=on"})
        );
    }

    #[test]
    fn empty_value_is_empty_string() {
        assert_eq!(parse("a=", ValueTyping::Structured), json!({"a": ""}));
    }

    #[test]
    fn empty_input_and_trailing_comma_are_ignored() {
        assert_eq!(parse("", ValueTyping::Structured), json!({}));
        assert_eq!(parse("a=1,", ValueTyping::Structured), json!({"a": 1}));
    }

    #[test]
    fn scalar_overwritten_by_nested_path() {
        let mut dest = Values::new();
        parse_into("a=1", ValueTyping::Structured, &mut dest).unwrap();
        parse_into("a.b=2", ValueTyping::Structured, &mut dest).unwrap();
        assert_eq!(Value::Object(dest), json!({"a": {"b": 2}}));
    }

    #[test]
    fn missing_equals_is_an_error() {
        let mut dest = Values::new();
        let err = parse_into("a=1,broken", ValueTyping::Structured, &mut dest).unwrap_err();
        assert_eq!(
            err,
            StrvalsError::MissingValue {
                key: "broken".to_string()
            }
        );
    }

    #[test]
    fn empty_segment_is_an_error() {
        let mut dest = Values::new();
        assert!(matches!(
            parse_into("a..b=1", ValueTyping::Structured, &mut dest),
            Err(StrvalsError::EmptySegment { .. })
        ));
        assert!(matches!(
            parse_into("=1", ValueTyping::Structured, &mut dest),
            Err(StrvalsError::EmptySegment { .. })
        ));
    }

    #[test]
    fn bad_indexes_are_errors() {
        let mut dest = Values::new();
        assert!(matches!(
            parse_into("a[x]=1", ValueTyping::Structured, &mut dest),
            Err(StrvalsError::BadIndex { .. })
        ));
        assert!(matches!(
            parse_into("a[1=1", ValueTyping::Structured, &mut dest),
            Err(StrvalsError::BadIndex { .. })
        ));
        assert!(matches!(
            parse_into("a[70000]=1", ValueTyping::Structured, &mut dest),
            Err(StrvalsError::IndexTooLarge { index: 70000, .. })
        ));
    }

    #[test]
    fn unterminated_list_is_an_error() {
        let mut dest = Values::new();
        assert!(matches!(
            parse_into("a={x", ValueTyping::Structured, &mut dest),
            Err(StrvalsError::UnterminatedList { .. })
        ));
    }

    #[test]
    fn raw_value_unescapes_without_typing() {
        let parsed = parse_assignments(r"cfg=files/a\,b.txt").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].raw_value(), "files/a,b.txt");
        assert_eq!(
            parsed[0].path,
            vec![Segment {
                name: "cfg".to_string(),
                indexes: vec![]
            }]
        );
    }
}
