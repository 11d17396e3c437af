// Item-by-item parsing. A provider page is a list of loosely-shaped JSON items;
// each one is converted on its own, and a failure only costs that item.

use serde_json::Value;
use tracing::warn;

use postpulse_common::{ParseError, Post, Provider};

/// Posts that parsed plus the number of items that did not.
#[derive(Debug, Default)]
pub struct Parsed {
    pub posts: Vec<Post>,
    pub skipped: usize,
}

/// Run `parse` over every item, logging and counting failures instead of
/// propagating them.
pub fn parse_each<'a, I, F>(provider: Provider, items: I, mut parse: F) -> Parsed
where
    I: IntoIterator<Item = &'a Value>,
    F: FnMut(&Value) -> Result<Post, ParseError>,
{
    let mut parsed = Parsed::default();
    for (index, item) in items.into_iter().enumerate() {
        match parse(item) {
            Ok(post) => parsed.posts.push(post),
            Err(err) => {
                warn!(
                    %provider,
                    index,
                    item = item_hint(item).unwrap_or("-"),
                    error = %err,
                    "Skipping item that failed to parse"
                );
                parsed.skipped += 1;
            }
        }
    }
    parsed
}

/// Best-effort identifier of a raw item for diagnostics.
fn item_hint(item: &Value) -> Option<&str> {
    item.get("id")
        .and_then(Value::as_str)
        .or_else(|| item.get("uri").and_then(Value::as_str))
        .or_else(|| item.pointer("/post/uri").and_then(Value::as_str))
}

// --- Loose document access ---
//
// Explicit presence and type checks with typed fallbacks; no schema is assumed.

/// An object-valued field. Absent → `Missing`, present but not an object → `WrongType`.
pub(crate) fn object<'a>(value: &'a Value, field: &'static str) -> Result<&'a Value, ParseError> {
    match value.get(field) {
        None | Some(Value::Null) => Err(ParseError::Missing(field)),
        Some(v) if v.is_object() => Ok(v),
        Some(_) => Err(ParseError::WrongType {
            field,
            expected: "object",
        }),
    }
}

/// A required, non-empty string field.
pub(crate) fn required_str<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, ParseError> {
    match optional_str(value, field)? {
        Some(s) if !s.trim().is_empty() => Ok(s),
        Some(_) => Err(ParseError::Empty(field)),
        None => Err(ParseError::Missing(field)),
    }
}

/// An optional string field. Absent/null → `None`; any other non-string → `WrongType`.
pub(crate) fn optional_str<'a>(
    value: &'a Value,
    field: &'static str,
) -> Result<Option<&'a str>, ParseError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ParseError::WrongType {
            field,
            expected: "string",
        }),
    }
}

/// A non-negative counter. Anything absent or unusable reads as 0.
pub(crate) fn count(value: &Value, field: &str) -> u64 {
    match value.get(field) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// String entries of an array field, skipping non-strings. Absent → empty.
pub(crate) fn string_list(value: &Value, field: &str) -> Vec<String> {
    value
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
