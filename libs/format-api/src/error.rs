/// Category of a format error. Lets the caller tell a bad schema from bad
/// data without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration, fail at startup.
    Config,
    /// Filesystem error.
    Io,
    /// Data format/parse error: malformed input.
    Format,
    /// Schema missing, unparsable, or message type not found.
    Schema,
    /// Value rejected by schema validation before encoding.
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Schema => f.write_str("schema"),
            ErrorKind::Validation => f.write_str("validation"),
        }
    }
}

/// Unified error type for all codec trait methods.
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// `From` impls assign the appropriate kind automatically and allow
/// ergonomic `?` in codec implementations.
#[derive(Clone, PartialEq, Eq)]
pub struct FormatError {
    kind: ErrorKind,
    message: String,
}

impl FormatError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Schema, message: msg.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Validation, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl std::fmt::Debug for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FormatError {}

// ---------------------------------------------------------------------------
// From impls: standard error types → FormatError with correct ErrorKind
// ---------------------------------------------------------------------------

impl From<std::io::Error> for FormatError {
    fn from(e: std::io::Error) -> Self { Self::io(e.to_string()) }
}

impl From<serde_json::Error> for FormatError {
    fn from(e: serde_json::Error) -> Self { Self::format(e.to_string()) }
}

impl From<std::str::Utf8Error> for FormatError {
    fn from(e: std::str::Utf8Error) -> Self { Self::format(e.to_string()) }
}

impl From<std::string::FromUtf8Error> for FormatError {
    fn from(e: std::string::FromUtf8Error) -> Self { Self::format(e.to_string()) }
}
