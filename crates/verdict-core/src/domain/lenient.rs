//! Forgiving field decoders for backend JSON.
//!
//! Judgements are written by language models and roster or generator fields
//! may come back as `null`. A well-formed object must never be rejected
//! because one field has the wrong shape.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `null` reads as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Booleans plus the usual string spellings; anything else is "not reported".
pub(crate) fn lenient_bool<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<bool>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }))
}

fn text_of(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Free text. A non-string value keeps its compact JSON rendering.
pub(crate) fn lenient_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(text_of))
}

/// A list of strings. A lone string becomes a one-item list; `null` and other
/// shapes become empty.
pub(crate) fn lenient_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.into_iter().filter_map(text_of).collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Fields {
        #[serde(default, deserialize_with = "null_as_default")]
        name: String,
        #[serde(default, deserialize_with = "lenient_text")]
        note: Option<String>,
        #[serde(default, deserialize_with = "lenient_list")]
        items: Vec<String>,
        #[serde(default, deserialize_with = "lenient_bool")]
        flag: Option<bool>,
    }

    fn read(value: Value) -> Fields {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn nulls_fall_back_to_defaults() {
        let p = read(json!({"name": null, "note": null, "items": null, "flag": null}));
        assert_eq!(p.name, "");
        assert_eq!(p.note, None);
        assert!(p.items.is_empty());
        assert_eq!(p.flag, None);
    }

    #[test]
    fn wrong_shapes_are_coerced() {
        let p = read(json!({
            "note": ["REFUSE", "ANSWER"],
            "items": ["a", 2, null, {"k": "v"}],
            "flag": "Yes"
        }));
        assert_eq!(p.note.as_deref(), Some(r#"["REFUSE","ANSWER"]"#));
        assert_eq!(p.items, ["a", "2", r#"{"k":"v"}"#]);
        assert_eq!(p.flag, Some(true));

        let p = read(json!({"items": "only one", "note": 4}));
        assert_eq!(p.items, ["only one"]);
        assert_eq!(p.note.as_deref(), Some("4"));

        let p = read(json!({"items": {"not": "a list"}, "flag": 1}));
        assert!(p.items.is_empty());
        assert_eq!(p.flag, None);
    }
}
