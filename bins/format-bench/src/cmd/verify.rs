use codec_xml::flatten_text;
use format_api::{DataFormat, Value};
use tracing::{info, warn};

/// Compare a decoded value with the original dataset.
///
/// JSON and Protobuf must decode to an equal value. XML is compared after
/// stripping the root element and `_text` wrappers, against the original
/// with every scalar rendered as text.
pub fn round_trip_matches(format: DataFormat, original: &Value, decoded: &Value, xml_root: &str) -> bool {
    match format {
        DataFormat::Json | DataFormat::Protobuf => decoded == original,
        DataFormat::Xml => decoded
            .get(xml_root)
            .is_some_and(|inner| flatten_text(inner) == stringify_scalars(original)),
    }
}

/// Log the outcome; never fails the run.
pub fn check(format: DataFormat, original: &Value, decoded: &Value, xml_root: &str) -> bool {
    let ok = round_trip_matches(format, original, decoded, xml_root);
    if ok {
        info!(format = %format, "round-trip matches original");
    } else {
        warn!(format = %format, decoded = %decoded, "round-trip differs from original");
    }
    ok
}

fn stringify_scalars(value: &Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Int64(i) => Value::String(i.to_string()),
        Value::UInt64(u) => Value::String(u.to_string()),
        Value::Float64(f) => Value::String(f.to_string()),
        Value::String(s) => Value::String(s.clone()),
        Value::Array(items) => Value::Array(items.iter().map(stringify_scalars).collect()),
        Value::Object(fields) => {
            Value::Object(fields.iter().map(|(k, v)| (k.clone(), stringify_scalars(v))).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::dataset;
    use codec_xml::{XmlFormatConfig, XmlFormatSerializer};
    use format_api::FormatSerializer;

    #[test]
    fn xml_matches_after_normalization() {
        let original = dataset::to_value(&dataset::employees());
        let ser = XmlFormatSerializer::new(XmlFormatConfig::default()).unwrap();
        let decoded = ser.deserialize(&ser.serialize(&original).unwrap()).unwrap();

        assert_ne!(decoded, original);
        assert!(round_trip_matches(DataFormat::Xml, &original, &decoded, "root"));
        assert!(!round_trip_matches(DataFormat::Xml, &original, &decoded, "other"));
    }

    #[test]
    fn json_requires_equal_values() {
        let original = dataset::to_value(&dataset::employees());
        let fewer = dataset::to_value(&dataset::employees()[..2]);
        assert!(check(DataFormat::Json, &original, &original.clone(), "root"));
        assert!(!check(DataFormat::Protobuf, &original, &fewer, "root"));
    }
}
