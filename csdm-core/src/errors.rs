//! Error type shared by every module in this crate.

/// The error type returned by all fallible operations in `csdm-core`.
#[derive(Debug)]
pub enum CsdmError {
    /// An argument was structurally invalid (wrong length, unknown variant, ...).
    InvalidArgument { msg: String },
    /// Dimension/shape mismatch between a dependent variable and its dimensions.
    Shape { msg: String },
    /// A value did not have the expected numeric or quantity type.
    TypeMismatch { msg: String },
    /// Failed to decode component data (base64, binary layout, text format).
    Decode { msg: String },
    /// The operation is not supported for the given combination of inputs.
    UnsupportedOp { msg: String },
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
    /// An object failed a structural or semantic invariant check.
    Validation { msg: String },
    /// Wrapped `serde_json::Error`.
    Json(serde_json::Error),
}

impl From<std::io::Error> for CsdmError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for CsdmError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl std::fmt::Display for CsdmError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use self::CsdmError::*;
        match self {
            InvalidArgument { msg } => write!(fmt, "invalid argument: {}", msg),
            Shape { msg } => write!(fmt, "shape error: {}", msg),
            TypeMismatch { msg } => write!(fmt, "type mismatch: {}", msg),
            Decode { msg } => write!(fmt, "decode error: {}", msg),
            UnsupportedOp { msg } => write!(fmt, "unsupported operation: {}", msg),
            Io(e) => write!(fmt, "{}", e),
            Validation { msg } => write!(fmt, "validation failed: {}", msg),
            Json(e) => write!(fmt, "{}", e),
        }
    }
}

impl From<CsdmError> for String {
    fn from(e: CsdmError) -> String {
        e.to_string()
    }
}

impl std::error::Error for CsdmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use self::CsdmError::*;
        match self {
            Io(e) => e.source(),
            Json(e) => e.source(),
            _ => None,
        }
    }
}
