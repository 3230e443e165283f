use format_api::{Validation, Value};
use prost_reflect::{Cardinality, FieldDescriptor, Kind, MessageDescriptor};

/// Check `value` against `desc` and report the first violation.
pub(crate) fn validate_message(desc: &MessageDescriptor, value: &Value) -> Validation {
    let mut path = Vec::new();
    match check_message(desc, value, &mut path) {
        Ok(()) => Validation::Valid,
        Err(reason) => Validation::Invalid { path: path.join("."), reason },
    }
}

/// Singular fields without presence tracking (plain proto3 scalars and
/// proto2 `required`) must be set. `optional`, message-typed, repeated
/// and map fields may be omitted.
fn is_required(field: &FieldDescriptor) -> bool {
    field.cardinality() == Cardinality::Required
        || (!field.is_list() && !field.is_map() && !field.supports_presence())
}

fn find_field(desc: &MessageDescriptor, key: &str) -> Option<FieldDescriptor> {
    desc.get_field_by_json_name(key).or_else(|| desc.get_field_by_name(key))
}

// The path is only popped on success, so on error it points at the
// offending member.
fn check_message(desc: &MessageDescriptor, value: &Value, path: &mut Vec<String>) -> Result<(), String> {
    // Well-known types have their own JSON mappings (Timestamp as string...).
    if desc.full_name().starts_with("google.protobuf.") {
        return Ok(());
    }
    let Value::Object(members) = value else {
        return Err(format!("{} object expected, got {}", desc.name(), value.type_name()));
    };

    for (key, _) in members {
        if find_field(desc, key).is_none() {
            path.push(key.clone());
            return Err(format!("unknown field of {}", desc.full_name()));
        }
    }

    for field in desc.fields() {
        let member = value
            .get(field.json_name())
            .or_else(|| value.get(field.name()))
            .filter(|v| !v.is_null());
        path.push(field.json_name().to_string());
        match member {
            None if is_required(&field) => {
                return Err(format!("required {} field missing", kind_name(&field.kind())));
            }
            None => {}
            Some(v) => check_field(&field, v, path)?,
        }
        path.pop();
    }
    Ok(())
}

fn check_field(field: &FieldDescriptor, value: &Value, path: &mut Vec<String>) -> Result<(), String> {
    if field.is_map() {
        let Value::Object(entries) = value else {
            return Err(format!("object expected for map field, got {}", value.type_name()));
        };
        let Kind::Message(entry) = field.kind() else {
            return Err("map field without entry message".to_string());
        };
        let key_kind = entry.map_entry_key_field().kind();
        let value_kind = entry.map_entry_value_field().kind();
        for (key, item) in entries {
            path.push(key.clone());
            check_map_key(&key_kind, key)?;
            check_kind(&value_kind, item, path)?;
            path.pop();
        }
        return Ok(());
    }

    if field.is_list() {
        let Value::Array(items) = value else {
            return Err(format!("array expected, got {}", value.type_name()));
        };
        let kind = field.kind();
        for (i, item) in items.iter().enumerate() {
            path.push(i.to_string());
            check_kind(&kind, item, path)?;
            path.pop();
        }
        return Ok(());
    }

    check_kind(&field.kind(), value, path)
}

fn check_kind(kind: &Kind, value: &Value, path: &mut Vec<String>) -> Result<(), String> {
    let ok = match kind {
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => in_range(value, i32::MIN.into(), i32::MAX.into()),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => in_range(value, i64::MIN.into(), i64::MAX.into()),
        Kind::Uint32 | Kind::Fixed32 => in_range(value, 0, u32::MAX.into()),
        Kind::Uint64 | Kind::Fixed64 => in_range(value, 0, u64::MAX.into()),
        Kind::Float | Kind::Double => matches!(value, Value::Int64(_) | Value::UInt64(_) | Value::Float64(_)),
        Kind::Bool => matches!(value, Value::Bool(_)),
        Kind::String | Kind::Bytes => matches!(value, Value::String(_)),
        Kind::Enum(e) => match value {
            Value::String(name) => e.get_value_by_name(name).is_some(),
            other => integral(other)
                .and_then(|n| i32::try_from(n).ok())
                .is_some_and(|n| e.get_value(n).is_some()),
        },
        Kind::Message(m) => return check_message(m, value, path),
    };
    if ok {
        Ok(())
    } else {
        Err(format!("{} expected, got {}", kind_name(kind), describe(value)))
    }
}

fn check_map_key(kind: &Kind, key: &str) -> Result<(), String> {
    let ok = match kind {
        Kind::String => true,
        Kind::Bool => key == "true" || key == "false",
        Kind::Uint32 | Kind::Fixed32 => key.parse::<u32>().is_ok(),
        Kind::Uint64 | Kind::Fixed64 => key.parse::<u64>().is_ok(),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => key.parse::<i32>().is_ok(),
        _ => key.parse::<i64>().is_ok(),
    };
    if ok {
        Ok(())
    } else {
        Err(format!("{} map key expected", kind_name(kind)))
    }
}

fn integral(value: &Value) -> Option<i128> {
    match *value {
        Value::Int64(i) => Some(i.into()),
        Value::UInt64(u) => Some(u.into()),
        Value::Float64(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i128),
        _ => None,
    }
}

fn in_range(value: &Value, min: i128, max: i128) -> bool {
    integral(value).is_some_and(|n| (min..=max).contains(&n))
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("string {s:?}"),
        Value::Int64(_) | Value::UInt64(_) | Value::Float64(_) => format!("{} {value}", value.type_name()),
        other => other.type_name().to_string(),
    }
}

fn kind_name(kind: &Kind) -> String {
    match kind {
        Kind::Double => "double".into(),
        Kind::Float => "float".into(),
        Kind::Int32 => "int32".into(),
        Kind::Int64 => "int64".into(),
        Kind::Uint32 => "uint32".into(),
        Kind::Uint64 => "uint64".into(),
        Kind::Sint32 => "sint32".into(),
        Kind::Sint64 => "sint64".into(),
        Kind::Fixed32 => "fixed32".into(),
        Kind::Fixed64 => "fixed64".into(),
        Kind::Sfixed32 => "sfixed32".into(),
        Kind::Sfixed64 => "sfixed64".into(),
        Kind::Bool => "bool".into(),
        Kind::String => "string".into(),
        Kind::Bytes => "bytes".into(),
        Kind::Message(m) => m.full_name().to_string(),
        Kind::Enum(e) => e.full_name().to_string(),
    }
}
