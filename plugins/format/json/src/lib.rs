use format_api::{DataFormat, FormatError, FormatSerializer, Value};
use tracing::trace;

// ---- Config ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct JsonFormatConfig {
    /// Pretty-print with 2-space indentation.
    pub pretty: bool,
}

impl Default for JsonFormatConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

// ---- FormatSerializer ----

pub struct JsonFormatSerializer {
    config: JsonFormatConfig,
}

impl JsonFormatSerializer {
    pub fn new(config: JsonFormatConfig) -> Self {
        Self { config }
    }
}

impl Default for JsonFormatSerializer {
    fn default() -> Self {
        Self::new(JsonFormatConfig::default())
    }
}

impl FormatSerializer for JsonFormatSerializer {
    fn deserialize(&self, data: &[u8]) -> Result<Value, FormatError> {
        let value: Value = serde_json::from_slice(data)
            .map_err(|e| FormatError::from(e).with_context("json deserialize"))?;
        Ok(value)
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, FormatError> {
        let bytes = if self.config.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        trace!(len = bytes.len(), pretty = self.config.pretty, "json serialized");
        Ok(bytes)
    }

    fn format(&self) -> DataFormat {
        DataFormat::Json
    }
}
