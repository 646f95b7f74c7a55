//! Zero-panic conversions between JSON documents and typed setting values
use crate::errors::ReconcilerError;
use crate::settings::{SettingKind, SettingValue};
use indexmap::IndexMap;
use serde_json::Value;

/// Parses a settings document. The top level must be an object; key order is kept.
pub fn parse_settings_object(text: &str) -> Result<IndexMap<String, Value>, ReconcilerError> {
    let v: Value = serde_json::from_str(text)?;
    if let Value::Object(map) = v {
        Ok(map.into_iter().collect())
    } else {
        Err(ReconcilerError::SettingsShape {
            actual: json_type_name(&v).to_string(),
        })
    }
}

/// Reads a stored JSON value as `kind`. Values written by older front-ends
/// may be stringly typed, so numeric and boolean strings are accepted too.
/// Returns `None` when the value cannot represent `kind`.
pub fn json_to_setting(value: &Value, kind: SettingKind) -> Option<SettingValue> {
    match kind {
        SettingKind::Boolean => match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|i| i != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
        .map(SettingValue::Boolean),
        SettingKind::Integer => match value {
            Value::Number(n) => n.as_i64().and_then(|i| i32::try_from(i).ok()),
            Value::String(s) => s.trim().parse::<i32>().ok(),
            _ => None,
        }
        .map(SettingValue::Integer),
        SettingKind::ScaledFloat => match value {
            Value::Number(n) => n.as_f64().map(|f| f as f32),
            Value::String(s) => s.trim().parse::<f32>().ok(),
            _ => None,
        }
        .filter(|f| f.is_finite())
        .map(SettingValue::ScaledFloat),
        SettingKind::String => match value {
            Value::String(s) => Some(SettingValue::String(s.clone())),
            _ => None,
        },
    }
}

/// Converts a typed value back into the JSON form `MemorySettingStore` keeps.
pub fn setting_to_json(value: &SettingValue) -> Value {
    match value {
        SettingValue::Boolean(b) => Value::Bool(*b),
        SettingValue::Integer(i) => Value::from(*i),
        SettingValue::ScaledFloat(f) => serde_json::Number::from_f64(f64::from(*f))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SettingValue::String(s) => Value::String(s.clone()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
