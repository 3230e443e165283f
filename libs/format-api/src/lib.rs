pub mod error;
pub mod format;
pub mod value;

pub use error::{ErrorKind, FormatError};
pub use format::{DataFormat, FormatSerializer, SchemaCodec, Validation};
pub use value::Value;
