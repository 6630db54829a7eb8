//! YAML transcoding: convert between Yamlet values and full YAML text.
//!
//! Mapping from YAML to Yamlet:
//!   - YAML null          -> Value::Null
//!   - YAML bool          -> Value::Bool
//!   - YAML integer       -> Value::Integer (BigInt)
//!   - YAML float         -> Value::Float
//!   - YAML string        -> Value::String
//!   - YAML sequence      -> Value::Sequence
//!   - YAML mapping       -> Value::Map (scalar keys only, order kept)
//!   - YAML tagged value  -> the untagged value
//!
//! Mapping from Yamlet to YAML:
//!   - Value::Integer      -> YAML integer (decimal string if beyond 64 bits)
//!   - Value::Float        -> YAML float (including .nan, .inf, -.inf)
//!   - everything else     -> the matching YAML node

use libyamlet::{Map, Value};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Decode a YAML string into a Yamlet Value.
pub fn decode(input: &str) -> Result<Value, String> {
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(input).map_err(|e| format!("YAML parse error: {}", e))?;
    yaml_to_value(&yaml_value)
}

/// Encode a Yamlet Value as a YAML string.
pub fn encode(value: &Value) -> Result<String, String> {
    serde_yaml::to_string(&value_to_yaml(value)).map_err(|e| format!("YAML encode error: {}", e))
}

fn yaml_key(key: &serde_yaml::Value) -> Result<String, String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        _ => Err(format!("Unsupported YAML mapping key: {:?}", key)),
    }
}

fn yaml_to_value(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Integer(BigInt::from(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Integer(BigInt::from(u)))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float(f))
            } else {
                Err(format!("Unsupported YAML number: {:?}", n))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(yaml_to_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (k, v) in mapping {
                map.insert(yaml_key(k)?, yaml_to_value(v)?);
            }
            Ok(Value::Map(map))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_value(&tagged.value),
    }
}

fn value_to_yaml(value: &Value) -> serde_yaml::Value {
    match value {
        Value::Null => serde_yaml::Value::Null,
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Integer(n) => match (n.to_i64(), n.to_u64()) {
            (Some(i), _) => serde_yaml::Value::Number(i.into()),
            (None, Some(u)) => serde_yaml::Value::Number(u.into()),
            (None, None) => serde_yaml::Value::String(n.to_string()),
        },
        Value::Float(f) => serde_yaml::Value::Number((*f).into()),
        Value::String(s) => serde_yaml::Value::String(s.clone()),
        Value::Sequence(items) => {
            serde_yaml::Value::Sequence(items.iter().map(value_to_yaml).collect())
        }
        Value::Map(map) => {
            let mut mapping = serde_yaml::Mapping::new();
            for (k, v) in map {
                mapping.insert(serde_yaml::Value::String(k.clone()), value_to_yaml(v));
            }
            serde_yaml::Value::Mapping(mapping)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_order_and_scalar_keys() {
        let value = decode("b: 1\n2: two\ntrue: .nan\n").unwrap();
        let map = value.as_map().unwrap();
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, ["b", "2", "true"]);
        assert!(map["true"].as_float().unwrap().is_nan());
    }

    #[test]
    fn test_encode_then_decode() {
        let value: Value = [
            ("name", Value::from("Steve")),
            ("tags", Value::from(vec![Value::from(1), Value::Null])),
        ]
        .into_iter()
        .collect();
        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);
    }
}
