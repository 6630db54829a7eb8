//! TOML transcoding: convert between Yamlet values and TOML text.
//!
//! Mapping from TOML to Yamlet:
//!   - TOML string         -> Value::String
//!   - TOML integer        -> Value::Integer (BigInt)
//!   - TOML float          -> Value::Float
//!   - TOML boolean        -> Value::Bool
//!   - TOML array          -> Value::Sequence
//!   - TOML table          -> Value::Map (key order kept)
//!   - TOML datetime       -> Value::String (ISO 8601 representation)
//!
//! Lossy edges:
//!   - TOML has no null type; Yamlet null values cause an error.
//!   - TOML integers are i64; larger Yamlet integers cause an error.
//!   - TOML requires the top-level value to be a table.

use libyamlet::{Map, Value};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use toml_edit::DocumentMut;

/// Decode a TOML string into a Yamlet Value.
pub fn decode(input: &str) -> Result<Value, String> {
    let doc: DocumentMut = input
        .parse::<DocumentMut>()
        .map_err(|e| format!("TOML parse error: {}", e))?;
    Ok(table_to_value(doc.as_table()))
}

/// Encode a Yamlet Value as a TOML string.
pub fn encode(value: &Value) -> Result<String, String> {
    let Value::Map(map) = value else {
        return Err("TOML requires the top-level value to be a map".to_string());
    };
    let mut doc = DocumentMut::new();
    for (key, item) in map {
        doc[key.as_str()] = value_to_item(item)?;
    }
    Ok(doc.to_string())
}

fn table_to_value(table: &toml_edit::Table) -> Value {
    Value::Map(
        table
            .iter()
            .map(|(key, item)| (key.to_string(), item_to_value(item)))
            .collect::<Map>(),
    )
}

fn item_to_value(item: &toml_edit::Item) -> Value {
    match item {
        toml_edit::Item::Value(v) => toml_to_value(v),
        toml_edit::Item::Table(t) => table_to_value(t),
        toml_edit::Item::ArrayOfTables(arr) => {
            Value::Sequence(arr.iter().map(table_to_value).collect())
        }
        toml_edit::Item::None => Value::Null,
    }
}

fn toml_to_value(v: &toml_edit::Value) -> Value {
    match v {
        toml_edit::Value::String(s) => Value::String(s.value().clone()),
        toml_edit::Value::Integer(i) => Value::Integer(BigInt::from(*i.value())),
        toml_edit::Value::Float(f) => Value::Float(*f.value()),
        toml_edit::Value::Boolean(b) => Value::Bool(*b.value()),
        toml_edit::Value::Datetime(dt) => Value::String(dt.value().to_string()),
        toml_edit::Value::Array(arr) => Value::Sequence(arr.iter().map(toml_to_value).collect()),
        toml_edit::Value::InlineTable(table) => Value::Map(
            table
                .iter()
                .map(|(key, val)| (key.to_string(), toml_to_value(val)))
                .collect::<Map>(),
        ),
    }
}

fn value_to_toml(value: &Value) -> Result<toml_edit::Value, String> {
    Ok(match value {
        Value::Null => return Err("TOML has no null type".to_string()),
        Value::Bool(b) => toml_edit::Value::from(*b),
        Value::Integer(n) => {
            let i = n
                .to_i64()
                .ok_or_else(|| format!("Integer {} too large for TOML (i64)", n))?;
            toml_edit::Value::from(i)
        }
        Value::Float(f) => toml_edit::Value::from(*f),
        Value::String(s) => toml_edit::Value::from(s.as_str()),
        Value::Sequence(items) => {
            let mut array = toml_edit::Array::new();
            for item in items {
                array.push(value_to_toml(item)?);
            }
            toml_edit::Value::Array(array)
        }
        Value::Map(map) => {
            let mut inline = toml_edit::InlineTable::new();
            for (k, v) in map {
                inline.insert(k.as_str(), value_to_toml(v)?);
            }
            toml_edit::Value::InlineTable(inline)
        }
    })
}

/// Nested maps become tables; everything else is an inline value.
fn value_to_item(value: &Value) -> Result<toml_edit::Item, String> {
    match value {
        Value::Map(map) => {
            let mut table = toml_edit::Table::new();
            for (k, v) in map {
                table.insert(k.as_str(), value_to_item(v)?);
            }
            Ok(toml_edit::Item::Table(table))
        }
        other => value_to_toml(other).map(toml_edit::Item::Value),
    }
}
