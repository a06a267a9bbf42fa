//! Typed-attribute wire format of change-feed images.
//!
//! Every attribute is a single-key object naming its type:
//! `{"S": "a"}`, `{"N": "42"}`, `{"M": {..}}`, `{"L": [..]}`, and so on.
//! Decoding yields plain JSON values; numbers become integers whenever the
//! value is integral.

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttributeError {
    #[error("image is not an object")]
    NotAnImage,

    #[error("attribute `{name}`: {reason}")]
    Malformed { name: String, reason: String },

    #[error("attribute `{name}`: unknown type tag `{tag}`")]
    UnknownType { name: String, tag: String },

    #[error("attribute `{name}`: invalid number `{text}`")]
    InvalidNumber { name: String, text: String },
}

/// Decode an image (map of typed attributes) into plain values.
pub fn decode_image(image: &Value) -> Result<Map<String, Value>, AttributeError> {
    let Value::Object(attrs) = image else {
        return Err(AttributeError::NotAnImage);
    };

    attrs
        .iter()
        .map(|(name, attr)| Ok((name.clone(), decode_attribute(name, attr)?)))
        .collect()
}

/// Decode one typed attribute. `name` is only used for error reporting.
pub fn decode_attribute(name: &str, attr: &Value) -> Result<Value, AttributeError> {
    let malformed = |reason: &str| AttributeError::Malformed {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let Value::Object(tagged) = attr else {
        return Err(malformed("expected a single-key type object"));
    };
    let mut entries = tagged.iter();
    let (Some((tag, inner)), None) = (entries.next(), entries.next()) else {
        return Err(malformed("expected exactly one type tag"));
    };

    match (tag.as_str(), inner) {
        ("S", Value::String(s)) | ("B", Value::String(s)) => Ok(Value::String(s.clone())),
        ("N", Value::String(text)) => decode_number(name, text),
        ("BOOL", Value::Bool(b)) => Ok(Value::Bool(*b)),
        ("NULL", _) => Ok(Value::Null),
        ("M", Value::Object(_)) => decode_image(inner)
            .map(Value::Object)
            .map_err(|e| nest(name, e)),
        ("L", Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| decode_attribute(&format!("{name}[{i}]"), item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ("SS", Value::Array(items)) | ("BS", Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(Value::String(s.clone())),
                _ => Err(malformed("set member is not a string")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ("NS", Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => decode_number(name, text),
                _ => Err(malformed("number set member is not a string")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ("S" | "B" | "N" | "BOOL" | "M" | "L" | "SS" | "BS" | "NS", _) => {
            Err(malformed(&format!("unexpected payload for `{tag}`")))
        }
        _ => Err(AttributeError::UnknownType {
            name: name.to_string(),
            tag: tag.clone(),
        }),
    }
}

fn nest(parent: &str, err: AttributeError) -> AttributeError {
    match err {
        AttributeError::NotAnImage => AttributeError::Malformed {
            name: parent.to_string(),
            reason: "map payload is not an object".to_string(),
        },
        AttributeError::Malformed { name, reason } => AttributeError::Malformed {
            name: format!("{parent}.{name}"),
            reason,
        },
        AttributeError::UnknownType { name, tag } => AttributeError::UnknownType {
            name: format!("{parent}.{name}"),
            tag,
        },
        AttributeError::InvalidNumber { name, text } => AttributeError::InvalidNumber {
            name: format!("{parent}.{name}"),
            text,
        },
    }
}

fn decode_number(name: &str, text: &str) -> Result<Value, AttributeError> {
    let invalid = || AttributeError::InvalidNumber {
        name: name.to_string(),
        text: text.to_string(),
    };

    let trimmed = text.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Ok(Value::Number(int.into()));
    }

    let float = trimmed.parse::<f64>().map_err(|_| invalid())?;
    if float.fract() == 0.0 && float >= i64::MIN as f64 && float <= i64::MAX as f64 {
        return Ok(Value::Number((float as i64).into()));
    }
    Number::from_f64(float).map(Value::Number).ok_or_else(invalid)
}

/// Encode a plain value into its typed-attribute form.
pub fn encode_attribute(value: &Value) -> Value {
    let tagged = match value {
        Value::Null => ("NULL", Value::Bool(true)),
        Value::Bool(b) => ("BOOL", Value::Bool(*b)),
        Value::Number(n) => ("N", Value::String(n.to_string())),
        Value::String(s) => ("S", Value::String(s.clone())),
        Value::Array(items) => ("L", Value::Array(items.iter().map(encode_attribute).collect())),
        Value::Object(map) => ("M", Value::Object(encode_image(map))),
    };

    let mut out = Map::new();
    out.insert(tagged.0.to_string(), tagged.1);
    Value::Object(out)
}

/// Encode a plain map into a typed-attribute image.
pub fn encode_image(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), encode_attribute(v)))
        .collect()
}
