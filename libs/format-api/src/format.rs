use crate::error::FormatError;
use crate::value::Value;

// ════════════════════════════════════════════════════════════════
//  Data Format
// ════════════════════════════════════════════════════════════════

/// Wire format produced by a serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    Json,
    Xml,
    Protobuf,
}

impl DataFormat {
    /// Human-readable name used in timing labels.
    pub fn label(self) -> &'static str {
        match self {
            DataFormat::Json => "JSON",
            DataFormat::Xml => "XML",
            DataFormat::Protobuf => "Protobuf",
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataFormat::Json => write!(f, "json"),
            DataFormat::Xml => write!(f, "xml"),
            DataFormat::Protobuf => write!(f, "protobuf"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Serializer traits
// ════════════════════════════════════════════════════════════════

/// Converts between raw bytes and the shared [`Value`] model.
///
/// Implementations must be stateless apart from their construction-time
/// configuration (schema, indentation).
pub trait FormatSerializer {
    /// Deserialize raw bytes into a structured value.
    fn deserialize(&self, data: &[u8]) -> Result<Value, FormatError>;

    /// Serialize a structured value into raw bytes.
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, FormatError>;

    /// Format of the bytes produced by this serializer.
    fn format(&self) -> DataFormat;
}

/// Outcome of checking a value against a schema.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// First violation found. `path` is dot-separated, array indices
    /// included (`employee.1.salary`); empty for the root.
    Invalid { path: String, reason: String },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    /// Turn a violation into a `Validation`-kind error.
    pub fn into_result(self) -> Result<(), FormatError> {
        match self {
            Validation::Valid => Ok(()),
            Validation::Invalid { path, reason } if path.is_empty() => {
                Err(FormatError::validation(reason))
            }
            Validation::Invalid { path, reason } => {
                Err(FormatError::validation(format!("{path}: {reason}")))
            }
        }
    }
}

/// Schema-driven codec: values must pass [`SchemaCodec::validate`] before
/// they can be encoded.
pub trait SchemaCodec {
    fn validate(&self, value: &Value) -> Validation;

    /// Validate, then encode. Fails with `ErrorKind::Validation` on the
    /// first violation.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, FormatError>;

    fn decode(&self, data: &[u8]) -> Result<Value, FormatError>;
}
