/// Error types shared by the shape document and trackcenter engines
use thiserror::Error;

/// Result type for shape and trackcenter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, editing or querying shapes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed or internally inconsistent shape text.
    #[error("malformed shape at line {line}: {detail}")]
    Format { line: usize, detail: String },

    /// A lookup by index or name found nothing.
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    /// An edit would reference a vertex or trilist that does not exist.
    #[error("invalid reference to {what} {index}")]
    InvalidReference { what: &'static str, index: usize },

    /// Following matrix parents revisited a matrix.
    #[error("matrix hierarchy cycle through '{name}'")]
    CycleDetected { name: String },

    /// Compressed, binary or undecodable input.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// A geometry or generator argument outside its domain.
    #[error("invalid parameter {name}: {detail}")]
    InvalidParameter { name: &'static str, detail: String },

    /// Configuration could not be read.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn format(line: usize, detail: impl Into<String>) -> Self {
        Self::Format {
            line,
            detail: detail.into(),
        }
    }

    pub(crate) fn not_found(what: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            what,
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid_parameter(name: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            detail: detail.into(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::format(12, "unbalanced ')'");
        assert_eq!(err.to_string(), "malformed shape at line 12: unbalanced ')'");

        let err = Error::not_found("vertex", 42);
        assert_eq!(err.to_string(), "vertex not found: 42");

        let err = Error::CycleDetected {
            name: "MAIN".to_string(),
        };
        assert!(err.to_string().contains("MAIN"));
    }
}
