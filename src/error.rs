//! Error types shared by every layer of the package engine.
//!
//! Each variant carries a stable machine-readable code (see [`Error::code`])
//! and belongs to one [`ErrorCategory`]. Format, semantic and input errors are
//! fatal. Remote errors are only surfaced after the bounded retry in
//! [`crate::remote`] is exhausted.

use thiserror::Error;

/// Broad error class used to decide how a failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Container-level corruption or unsupported features.
    Format,
    /// The package violates a document-package convention.
    Semantic,
    /// Extension discovery or dispatch.
    Extension,
    /// Remote compression service failures.
    Remote,
    /// Null, empty or malformed arguments.
    Input,
    /// Local I/O.
    Io,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("CRC-32 mismatch for {path}: expected {expected:08x}, got {actual:08x}")]
    CrcMismatch {
        path: String,
        expected: u32,
        actual: u32,
    },

    #[error("Deflate stream error in {path}: {reason}")]
    Deflate { path: String, reason: String },

    #[error("Archive too large: {0}")]
    ArchiveTooLarge(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path conflict: {0}")]
    PathConflict(String),

    #[error("Entry already exists: {0}")]
    EntryExists(String),

    #[error("XML error in {path}: {reason}")]
    Xml { path: String, reason: String },

    #[error("[Content_Types].xml is missing")]
    ContentTypesMissing,

    #[error("Content type not resolvable for part: {0}")]
    ContentTypeUnresolved(String),

    #[error("Theme part missing: {0}")]
    ThemePartMissing(String),

    #[error("Invalid color scheme: {0}")]
    InvalidColorScheme(String),

    #[error("Invalid color value: {0}")]
    InvalidColorValue(String),

    #[error("Invalid font scheme: {0}")]
    InvalidFontScheme(String),

    #[error("Dangling relationship {id} in {owner}: {reason}")]
    DanglingRelationship {
        owner: String,
        id: String,
        reason: String,
    },

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Extension {name} rejected: missing {}", missing.join(", "))]
    ExtensionRejected { name: String, missing: Vec<String> },

    #[error("Remote service unavailable after {attempts} attempt(s): {last_error}")]
    RemoteServiceUnavailable { attempts: u32, last_error: String },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot encode operation result: {0}")]
    ResultEncoding(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable code suitable for logs and API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::MalformedArchive(_) => "ZIP_MALFORMED",
            Error::UnsupportedCompression(_) => "ZIP_UNSUPPORTED_COMPRESSION",
            Error::CrcMismatch { .. } => "ZIP_CRC_MISMATCH",
            Error::Deflate { .. } => "ZIP_DEFLATE",
            Error::ArchiveTooLarge(_) => "ZIP_TOO_LARGE",
            Error::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Error::InvalidPath(_) => "INVALID_PATH",
            Error::PathConflict(_) => "PATH_CONFLICT",
            Error::EntryExists(_) => "ENTRY_EXISTS",
            Error::Xml { .. } => "XML_MALFORMED",
            Error::ContentTypesMissing => "CONTENT_TYPES_MISSING",
            Error::ContentTypeUnresolved(_) => "CONTENT_TYPE_UNRESOLVED",
            Error::ThemePartMissing(_) => "THEME_PART_MISSING",
            Error::InvalidColorScheme(_) => "INVALID_COLOR_SCHEME",
            Error::InvalidColorValue(_) => "INVALID_COLOR_VALUE",
            Error::InvalidFontScheme(_) => "INVALID_FONT_SCHEME",
            Error::DanglingRelationship { .. } => "DANGLING_RELATIONSHIP",
            Error::OperationNotFound(_) => "OPERATION_NOT_FOUND",
            Error::ExtensionRejected { .. } => "EXTENSION_REJECTED",
            Error::RemoteServiceUnavailable { .. } => "REMOTE_SERVICE_UNAVAILABLE",
            Error::EmptyInput(_) => "INPUT_EMPTY",
            Error::InvalidInput(_) => "INPUT_INVALID",
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::ResultEncoding(_) => "RESULT_ENCODING",
            Error::Io(_) => "IO",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MalformedArchive(_)
            | Error::UnsupportedCompression(_)
            | Error::CrcMismatch { .. }
            | Error::Deflate { .. }
            | Error::ArchiveTooLarge(_) => ErrorCategory::Format,
            Error::EntryNotFound(_)
            | Error::PathConflict(_)
            | Error::EntryExists(_)
            | Error::Xml { .. }
            | Error::ContentTypesMissing
            | Error::ContentTypeUnresolved(_)
            | Error::ThemePartMissing(_)
            | Error::InvalidColorScheme(_)
            | Error::InvalidColorValue(_)
            | Error::InvalidFontScheme(_)
            | Error::DanglingRelationship { .. } => ErrorCategory::Semantic,
            Error::OperationNotFound(_)
            | Error::ExtensionRejected { .. }
            | Error::ResultEncoding(_) => {
                ErrorCategory::Extension
            }
            Error::RemoteServiceUnavailable { .. } => ErrorCategory::Remote,
            Error::EmptyInput(_)
            | Error::InvalidInput(_)
            | Error::InvalidPath(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_) => ErrorCategory::Input,
            Error::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether a local codec failure should be handed to the remote service.
    pub fn is_compression_failure(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedCompression(_) | Error::Deflate { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Error::MalformedArchive("x".into()).code(), "ZIP_MALFORMED");
        assert_eq!(Error::EmptyInput("x".into()).code(), "INPUT_EMPTY");
        assert_eq!(Error::InvalidInput("x".into()).code(), "INPUT_INVALID");
        assert_eq!(Error::InvalidInput("x".into()).category(), ErrorCategory::Input);
        assert_eq!(
            Error::RemoteServiceUnavailable {
                attempts: 3,
                last_error: "boom".into()
            }
            .code(),
            "REMOTE_SERVICE_UNAVAILABLE"
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            Error::UnsupportedCompression(12).category(),
            ErrorCategory::Format
        );
        assert_eq!(
            Error::ThemePartMissing("x".into()).category(),
            ErrorCategory::Semantic
        );
        assert!(Error::UnsupportedCompression(14).is_compression_failure());
        assert!(!Error::MalformedArchive("x".into()).is_compression_failure());
    }

    #[test]
    fn test_rejection_message_lists_missing_names() {
        let err = Error::ExtensionRejected {
            name: "demo".into(),
            missing: vec!["metadata".into(), "applyTheme".into()],
        };
        assert_eq!(err.to_string(), "Extension demo rejected: missing metadata, applyTheme");
    }
}
