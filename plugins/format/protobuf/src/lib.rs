use std::path::{Path, PathBuf};

use format_api::{DataFormat, FormatError, FormatSerializer, SchemaCodec, Validation, Value};
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, SerializeOptions};
use tracing::{debug, trace};

mod validate;

// ---- Config ----

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct ProtobufFormatConfig {
    /// `.proto` source, or a FileDescriptorSet (`.bin`/`.desc`/`.pb` from
    /// `protoc --descriptor_set_out`).
    pub schema: PathBuf,
    /// Fully-qualified message type name (e.g. "Employees").
    pub message_type: String,
}

// ---- Schema loading ----

/// Load the descriptor pool and resolve the configured message type.
pub fn load_descriptor(cfg: &ProtobufFormatConfig) -> Result<MessageDescriptor, FormatError> {
    if cfg.schema.as_os_str().is_empty() {
        return Err(FormatError::config("protobuf: schema is required"));
    }
    if cfg.message_type.is_empty() {
        return Err(FormatError::config("protobuf: message_type is required"));
    }
    if !cfg.schema.is_file() {
        return Err(FormatError::schema(format!(
            "protobuf: schema file '{}' not found",
            cfg.schema.display()
        )));
    }

    let pool = match cfg.schema.extension().and_then(|e| e.to_str()) {
        Some("proto") => compile_proto(&cfg.schema)?,
        _ => decode_descriptor_set(&cfg.schema)?,
    };

    let descriptor = pool.get_message_by_name(&cfg.message_type).ok_or_else(|| {
        FormatError::schema(format!(
            "protobuf: message type '{}' not found in '{}'",
            cfg.message_type,
            cfg.schema.display()
        ))
    })?;
    debug!(
        schema = %cfg.schema.display(),
        message = descriptor.full_name(),
        fields = descriptor.fields().count(),
        "protobuf schema loaded"
    );
    Ok(descriptor)
}

/// Compile `.proto` source with its own directory as the include root.
fn compile_proto(path: &Path) -> Result<DescriptorPool, FormatError> {
    let include = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file = path
        .file_name()
        .ok_or_else(|| FormatError::schema(format!("protobuf: bad schema path '{}'", path.display())))?;

    let mut compiler = protox::Compiler::new([include])
        .map_err(|e| FormatError::schema(format!("protobuf: failed to compile schema: {e}")))?;
    compiler
        .open_files([file])
        .map_err(|e| FormatError::schema(format!("protobuf: failed to compile schema: {e}")))?;
    Ok(compiler.descriptor_pool())
}

fn decode_descriptor_set(path: &Path) -> Result<DescriptorPool, FormatError> {
    let descriptor_bytes = std::fs::read(path).map_err(|e| {
        FormatError::io(format!("protobuf: failed to read descriptor file '{}': {e}", path.display()))
    })?;
    DescriptorPool::decode(descriptor_bytes.as_slice())
        .map_err(|e| FormatError::schema(format!("protobuf: failed to parse descriptor set: {e}")))
}

// ---- Codec ----

pub struct ProtobufCodec {
    descriptor: MessageDescriptor,
}

impl ProtobufCodec {
    pub fn new(descriptor: MessageDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn load(cfg: &ProtobufFormatConfig) -> Result<Self, FormatError> {
        Ok(Self::new(load_descriptor(cfg)?))
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }
}

impl SchemaCodec for ProtobufCodec {
    fn validate(&self, value: &Value) -> Validation {
        validate::validate_message(&self.descriptor, value)
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, FormatError> {
        self.validate(value)
            .into_result()
            .map_err(|e| e.with_context("protobuf validation failed"))?;

        let json = serde_json::to_value(value)?;
        let message = DynamicMessage::deserialize(self.descriptor.clone(), json)
            .map_err(|e| FormatError::format(format!("value→protobuf: {e}")))?;
        let bytes = message.encode_to_vec();
        trace!(len = bytes.len(), message = self.descriptor.full_name(), "protobuf encoded");
        Ok(bytes)
    }

    fn decode(&self, data: &[u8]) -> Result<Value, FormatError> {
        let message = DynamicMessage::decode(self.descriptor.clone(), data)
            .map_err(|e| FormatError::format(format!("protobuf decode: {e}")))?;
        // Defaults and 64-bit integers stay as written so the result passes
        // `validate` again. Through bytes rather than serde_json::Value to
        // keep field order.
        let options = SerializeOptions::new().skip_default_fields(false).stringify_64_bit_integers(false);
        let mut json = Vec::new();
        message.serialize_with_options(&mut serde_json::Serializer::new(&mut json), &options)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

// ---- FormatSerializer ----

impl FormatSerializer for ProtobufCodec {
    fn deserialize(&self, data: &[u8]) -> Result<Value, FormatError> {
        SchemaCodec::decode(self, data)
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, FormatError> {
        SchemaCodec::encode(self, value)
    }

    fn format(&self) -> DataFormat {
        DataFormat::Protobuf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use format_api::ErrorKind;

    const SCHEMA: &str = r#"
syntax = "proto3";

enum Grade {
  GRADE_UNSPECIFIED = 0;
  JUNIOR = 1;
  SENIOR = 2;
}

message Employee {
  int32 id = 1;
  string name = 2;
  int32 salary = 3;
  string email = 4;
  string hire_date = 5;
  optional string nickname = 6;
  Grade grade = 7;
  map<string, uint32> skills = 8;
}

message Employees {
  repeated Employee employee = 1;
}
"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        cfg: ProtobufFormatConfig,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("employee.proto");
        std::fs::write(&schema, SCHEMA).unwrap();
        Fixture {
            cfg: ProtobufFormatConfig { schema, message_type: "Employees".into() },
            _dir: dir,
        }
    }

    fn codec(f: &Fixture) -> ProtobufCodec {
        ProtobufCodec::load(&f.cfg).unwrap()
    }

    fn employee(id: i64, name: &str, salary: Value) -> Value {
        [
            ("id", Value::from(id)),
            ("name", Value::from(name)),
            ("salary", salary),
            ("email", Value::from(format!("{}@mail.com", name.to_lowercase()))),
            ("hireDate", Value::from("2022-01-15")),
            ("grade", Value::from("SENIOR")),
        ]
        .into_iter()
        .collect()
    }

    fn employees(items: Vec<Value>) -> Value {
        [("employee", Value::from(items))].into_iter().collect()
    }

    fn without(record: &Value, key: &str) -> Value {
        let fields = record.as_object().unwrap();
        Value::Object(fields.iter().filter(|(k, _)| k != key).cloned().collect())
    }

    fn with(record: &Value, key: &str, value: Value) -> Value {
        let mut fields = record.as_object().unwrap().to_vec();
        fields.push((key.to_string(), value));
        Value::Object(fields)
    }

    fn invalid(v: Validation) -> (String, String) {
        match v {
            Validation::Invalid { path, reason } => (path, reason),
            Validation::Valid => panic!("expected a violation"),
        }
    }

    #[test]
    fn valid_list_passes() {
        let f = fixture();
        let value = employees(vec![employee(1, "Ali", Value::from(9000)), employee(2, "Kamal", Value::from(22000))]);
        assert_eq!(codec(&f).validate(&value), Validation::Valid);
    }

    #[test]
    fn empty_list_passes() {
        let f = fixture();
        assert!(codec(&f).validate(&employees(Vec::new())).is_valid());
        assert!(codec(&f).validate(&Value::Object(Vec::new())).is_valid());
    }

    #[test]
    fn salary_as_text_is_rejected() {
        let f = fixture();
        let value = employees(vec![employee(1, "Ali", Value::from(9000)), employee(2, "Kamal", Value::from("22000"))]);
        let (path, reason) = invalid(codec(&f).validate(&value));
        assert_eq!(path, "employee.1.salary");
        assert_eq!(reason, r#"int32 expected, got string "22000""#);
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let f = fixture();
        let value = employees(vec![without(&employee(1, "Ali", Value::from(9000)), "email")]);
        let (path, reason) = invalid(codec(&f).validate(&value));
        assert_eq!(path, "employee.0.email");
        assert_eq!(reason, "required string field missing");
    }

    #[test]
    fn null_counts_as_missing() {
        let f = fixture();
        let record = with(&without(&employee(1, "Ali", Value::from(9000)), "name"), "name", Value::Null);
        let (path, _) = invalid(codec(&f).validate(&employees(vec![record])));
        assert_eq!(path, "employee.0.name");
    }

    #[test]
    fn optional_and_message_fields_may_be_omitted() {
        let f = fixture();
        let record = employee(1, "Ali", Value::from(9000));
        assert!(record.get("nickname").is_none());
        assert!(record.get("skills").is_none());
        assert!(codec(&f).validate(&employees(vec![record])).is_valid());
    }

    #[test]
    fn proto_field_names_are_accepted() {
        let f = fixture();
        let record = employee(1, "Ali", Value::from(9000));
        let renamed = with(&without(&record, "hireDate"), "hire_date", Value::from("2022-01-15"));
        assert!(codec(&f).validate(&employees(vec![renamed])).is_valid());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let f = fixture();
        let record = with(&employee(1, "Ali", Value::from(9000)), "department", Value::from("R&D"));
        let (path, reason) = invalid(codec(&f).validate(&employees(vec![record])));
        assert_eq!(path, "employee.0.department");
        assert_eq!(reason, "unknown field of Employee");
    }

    #[test]
    fn out_of_range_integer_is_rejected() {
        let f = fixture();
        let value = employees(vec![employee(1, "Ali", Value::from(i64::from(i32::MAX) + 1))]);
        let (path, reason) = invalid(codec(&f).validate(&value));
        assert_eq!(path, "employee.0.salary");
        assert!(reason.starts_with("int32 expected"), "{reason}");
    }

    #[test]
    fn integral_floats_are_integers() {
        let f = fixture();
        let codec = codec(&f);
        assert!(codec.validate(&employees(vec![employee(1, "Ali", Value::Float64(9000.0))])).is_valid());
        assert!(!codec.validate(&employees(vec![employee(1, "Ali", Value::Float64(9000.5))])).is_valid());
    }

    #[test]
    fn enum_accepts_declared_names_and_numbers() {
        let f = fixture();
        let codec = codec(&f);
        let base = without(&employee(1, "Ali", Value::from(9000)), "grade");
        assert!(codec.validate(&employees(vec![with(&base, "grade", Value::from(1))])).is_valid());
        let (path, reason) = invalid(codec.validate(&employees(vec![with(&base, "grade", Value::from("CEO"))])));
        assert_eq!(path, "employee.0.grade");
        assert!(reason.starts_with("Grade expected"), "{reason}");
    }

    #[test]
    fn map_values_are_checked() {
        let f = fixture();
        let codec = codec(&f);
        let base = employee(1, "Ali", Value::from(9000));
        let good: Value = [("rust", Value::from(5))].into_iter().collect();
        let bad: Value = [("rust", Value::from(-5))].into_iter().collect();
        assert!(codec.validate(&employees(vec![with(&base, "skills", good)])).is_valid());
        let (path, _) = invalid(codec.validate(&employees(vec![with(&base, "skills", bad)])));
        assert_eq!(path, "employee.0.skills.rust");
    }

    #[test]
    fn repeated_field_requires_array() {
        let f = fixture();
        let value: Value = [("employee", employee(1, "Ali", Value::from(9000)))].into_iter().collect();
        let (path, reason) = invalid(codec(&f).validate(&value));
        assert_eq!(path, "employee");
        assert_eq!(reason, "array expected, got object");
    }

    #[test]
    fn root_must_be_object() {
        let f = fixture();
        let (path, _) = invalid(codec(&f).validate(&Value::Array(Vec::new())));
        assert_eq!(path, "");
    }

    #[test]
    fn encode_fails_fast_on_validation() {
        let f = fixture();
        let value = employees(vec![employee(1, "Ali", Value::from("lots"))]);
        let err = codec(&f).encode(&value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().starts_with("protobuf validation failed: employee.0.salary: "), "{err}");
    }

    #[test]
    fn round_trip_is_identity() {
        let f = fixture();
        let codec = codec(&f);
        let skills: Value = [("rust", Value::from(5))].into_iter().collect();
        let value = employees(vec![
            with(&employee(1, "Ali", Value::from(9000)), "skills", skills),
            with(&employee(3, "Amal", Value::from(23000)), "skills", Value::Object(Vec::new())),
        ]);
        let bytes = codec.serialize(&value).unwrap();
        let decoded = codec.deserialize(&bytes).unwrap();
        assert_eq!(decoded, value);
        let order: Vec<i64> = decoded
            .get("employee")
            .and_then(Value::as_array)
            .unwrap()
            .iter()
            .filter_map(|e| e.get("id").and_then(Value::as_i64))
            .collect();
        assert_eq!(order, [1, 3]);
    }

    #[test]
    fn default_values_and_64_bit_integers_survive_decode() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("ledger.proto");
        std::fs::write(
            &schema,
            "syntax = \"proto3\";\nmessage Entry { int32 id = 1; string name = 2; int64 big = 3; }\n\
             message Ledger { repeated Entry entry = 1; }\n",
        )
        .unwrap();
        let codec = ProtobufCodec::load(&ProtobufFormatConfig { schema, message_type: "Ledger".into() }).unwrap();

        let entry: Value =
            [("id", Value::from(0)), ("name", Value::from("")), ("big", Value::from(5))].into_iter().collect();
        let value: Value = [("entry", Value::from(vec![entry]))].into_iter().collect();
        assert!(codec.validate(&value).is_valid());

        let decoded = codec.decode(&codec.encode(&value).unwrap()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(decoded.get("entry").and_then(Value::as_array).unwrap()[0].get("big"), Some(&Value::Int64(5)));
        assert_eq!(codec.validate(&decoded), Validation::Valid);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let f = fixture();
        let err = codec(&f).decode(&[0x0a, 0xff, 0xff]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn descriptor_set_is_accepted() {
        let f = fixture();
        let dir = f.cfg.schema.parent().unwrap();
        let fds = protox::compile(["employee.proto"], [dir]).unwrap();
        let bin = dir.join("employee.bin");
        std::fs::write(&bin, fds.encode_to_vec()).unwrap();

        let codec = ProtobufCodec::load(&ProtobufFormatConfig { schema: bin, message_type: "Employees".into() }).unwrap();
        assert_eq!(codec.descriptor().full_name(), "Employees");
        assert_eq!(codec.format(), DataFormat::Protobuf);
    }

    #[test]
    fn missing_schema_file_is_schema_error() {
        let cfg = ProtobufFormatConfig { schema: "does/not/exist.proto".into(), message_type: "Employees".into() };
        assert_eq!(ProtobufCodec::load(&cfg).err().unwrap().kind(), ErrorKind::Schema);
    }

    #[test]
    fn unknown_message_type_is_schema_error() {
        let mut f = fixture();
        f.cfg.message_type = "Payroll".into();
        let err = ProtobufCodec::load(&f.cfg).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.message().contains("'Payroll' not found"), "{err}");
    }

    #[test]
    fn malformed_schema_is_schema_error() {
        let f = fixture();
        std::fs::write(&f.cfg.schema, "syntax = \"proto3\"; message Broken { int32 id = ; }").unwrap();
        assert_eq!(ProtobufCodec::load(&f.cfg).err().unwrap().kind(), ErrorKind::Schema);
    }

    #[test]
    fn empty_config_is_config_error() {
        let err = ProtobufCodec::load(&ProtobufFormatConfig::default()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
