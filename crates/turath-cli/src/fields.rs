// Field parsing for the --set flag
//
// Parses key=value pairs into a draft-shaped JSON object. Nested keys use dot
// notation and a trailing `[]` appends to a list:
//   gps.lat=27.1         -> { "gps": { "lat": "27.1" } }
//   images[]=sha256:...  -> { "images": ["sha256:..."] }
// Numbers stay strings; the draft decoder accepts numeric text.

use anyhow::{anyhow, Result};
use serde_json::{json, Map, Value};

/// Parses a list of key=value strings into a JSON object.
///
/// `true` and `false` become booleans; `null` clears a field.
pub fn parse_fields(args: &[String]) -> Result<Value> {
    let mut root = Map::new();

    for arg in args {
        let (key, value) = parse_key_value(arg)?;
        insert_nested(&mut root, &key, coerce(&value))?;
    }

    Ok(Value::Object(root))
}

/// Merges `patch` into `base`, descending into objects and replacing
/// everything else.
pub fn merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                let descend = value.is_object() && base.get(&key).is_some_and(Value::is_object);
                if !descend {
                    base.insert(key, value);
                } else if let Some(existing) = base.get_mut(&key) {
                    merge(existing, value);
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

fn parse_key_value(arg: &str) -> Result<(String, String)> {
    let Some((key, value)) = arg.split_once('=') else {
        return Err(anyhow!("Invalid field format: '{}'. Expected 'key=value'", arg));
    };

    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Empty key in field: '{}'", arg));
    }

    Ok((key.to_string(), value.trim().to_string()))
}

fn coerce(value: &str) -> Value {
    match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        other => json!(other),
    }
}

fn insert_nested(root: &mut Map<String, Value>, key: &str, value: Value) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    let mut current = root;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            return Err(anyhow!("Invalid key path '{}': empty segment after dot", key));
        }

        if i == parts.len() - 1 {
            return insert_leaf(current, key, part, value);
        }

        let nested = current
            .entry(part.to_string())
            .or_insert_with(|| json!({}));
        match nested {
            Value::Object(map) => current = map,
            _ => {
                return Err(anyhow!(
                    "Cannot set nested key '{}': '{}' is already a scalar value",
                    key,
                    part
                ))
            }
        }
    }

    Ok(())
}

fn insert_leaf(map: &mut Map<String, Value>, key: &str, part: &str, value: Value) -> Result<()> {
    let Some(list_key) = part.strip_suffix("[]") else {
        map.insert(part.to_string(), value);
        return Ok(());
    };
    if list_key.is_empty() {
        return Err(anyhow!("Invalid key path '{}': list marker without a name", key));
    }

    match map
        .entry(list_key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(items) => {
            items.push(value);
            Ok(())
        }
        _ => Err(anyhow!("Cannot append to '{}': it is not a list", list_key)),
    }
}
