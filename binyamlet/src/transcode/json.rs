//! JSON transcoding: convert between Yamlet values and JSON text.
//!
//! Mapping from JSON to Yamlet:
//!   - JSON null            -> Value::Null
//!   - JSON boolean         -> Value::Bool
//!   - JSON integer         -> Value::Integer (BigInt)
//!   - JSON number          -> Value::Float
//!   - JSON string          -> Value::String
//!   - JSON array           -> Value::Sequence
//!   - JSON object          -> Value::Map (member order kept)
//!
//! Lossy edges:
//!   - JSON has no NaN or infinities; such floats are an error.
//!   - Integers beyond the 64-bit range are an error.

use libyamlet::{Map, Value};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde_json::{Number, Value as Json};

/// Decode a JSON string into a Yamlet Value.
pub fn decode(input: &str) -> Result<Value, String> {
    let json: Json = serde_json::from_str(input).map_err(|e| format!("JSON parse error: {}", e))?;
    Ok(json_to_value(&json))
}

/// Encode a Yamlet Value as pretty-printed JSON text.
pub fn encode(value: &Value) -> Result<String, String> {
    let json = value_to_json(value)?;
    let mut text =
        serde_json::to_string_pretty(&json).map_err(|e| format!("JSON encode error: {}", e))?;
    text.push('\n');
    Ok(text)
}

fn json_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(BigInt::from(i))
            } else if let Some(u) = n.as_u64() {
                Value::Integer(BigInt::from(u))
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::Sequence(items.iter().map(json_to_value).collect()),
        Json::Object(members) => Value::Map(
            members
                .iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect::<Map>(),
        ),
    }
}

fn value_to_json(value: &Value) -> Result<Json, String> {
    match value {
        Value::Null => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Integer(n) => match (n.to_i64(), n.to_u64()) {
            (Some(i), _) => Ok(Json::Number(i.into())),
            (None, Some(u)) => Ok(Json::Number(u.into())),
            (None, None) => Err(format!("Integer {} does not fit in a JSON number", n)),
        },
        Value::Float(f) => Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| format!("JSON has no representation for {:?}", value)),
        Value::String(s) => Ok(Json::String(s.clone())),
        Value::Sequence(items) => items
            .iter()
            .map(value_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array),
        Value::Map(map) => {
            let mut members = serde_json::Map::new();
            for (k, v) in map {
                members.insert(k.clone(), value_to_json(v)?);
            }
            Ok(Json::Object(members))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_order_survives_both_ways() {
        let value = decode(r#"{"z": 1, "a": [true, null, 2.5], "m": "x"}"#).unwrap();
        let keys: Vec<&String> = value.as_map().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
        assert_eq!(
            encode(&value).unwrap(),
            "{\n  \"z\": 1,\n  \"a\": [\n    true,\n    null,\n    2.5\n  ],\n  \"m\": \"x\"\n}\n"
        );
    }

    #[test]
    fn test_unrepresentable_values_are_errors() {
        assert!(encode(&Value::Float(f64::NAN)).is_err());
        let big: BigInt = "123456789012345678901234567890".parse().unwrap();
        assert!(encode(&Value::Integer(big)).is_err());
    }
}
