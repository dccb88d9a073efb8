//! Error types for the immosync CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=archive, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Per-record normalization failures live in [`NormalizeError`]. They are
//! absorbed by the importer and never surface as an [`Error`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for immosync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,
    SchemaMismatch,

    // Archive (exit 3)
    NotAnArchive,
    NoStructuredData,
    MalformedData,
    UndeterminedMode,
    ExtractionFailed,
    ImportFailed,

    // Validation (exit 4)
    InvalidArgument,
    ProviderNotFound,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::SchemaMismatch => "SCHEMA_MISMATCH",
            Self::NotAnArchive => "NOT_AN_ARCHIVE",
            Self::NoStructuredData => "NO_STRUCTURED_DATA",
            Self::MalformedData => "MALFORMED_DATA",
            Self::UndeterminedMode => "UNDETERMINED_MODE",
            Self::ExtractionFailed => "EXTRACTION_FAILED",
            Self::ImportFailed => "IMPORT_FAILED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ProviderNotFound => "PROVIDER_NOT_FOUND",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::DatabaseError
            | Self::SchemaMismatch => 2,
            Self::NotAnArchive
            | Self::NoStructuredData
            | Self::MalformedData
            | Self::UndeterminedMode
            | Self::ExtractionFailed
            | Self::ImportFailed => 3,
            Self::InvalidArgument | Self::ProviderNotFound => 4,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether re-running the same operation later could succeed.
    ///
    /// Nothing in the import core retries on its own; callers decide
    /// whether to re-queue an archive. Schema drift and malformed
    /// archives never become valid by retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DatabaseError | Self::IoError | Self::ExtractionFailed)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in immosync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `immosync init` first")]
    NotInitialized,

    #[error("Already initialized at {}", path.display())]
    AlreadyInitialized { path: PathBuf },

    #[error("Could not open archive in \"{}\": {source}", path.display())]
    NotAnArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Archive \"{}\" does not contain a .xml file", path.display())]
    NoStructuredData { path: PathBuf },

    #[error("Malformed OpenImmo data in \"{file}\": {message}")]
    MalformedData { file: String, message: String },

    #[error("Could not parse transfer mode, got \"{found}\"")]
    UndeterminedMode { found: String },

    #[error("Could not extract \"{name}\" to {}: {message}", destination.display())]
    Extraction {
        name: String,
        destination: PathBuf,
        message: String,
    },

    #[error("{failed} of {total} archive(s) could not be imported")]
    ImportFailed { failed: usize, total: usize },

    #[error("Column \"{table}.{column}\" does not exist")]
    SchemaMismatch { table: String, column: String },

    #[error("Provider not found: {key}")]
    ProviderNotFound { key: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::NotAnArchive { .. } | Self::Zip(_) => ErrorCode::NotAnArchive,
            Self::NoStructuredData { .. } => ErrorCode::NoStructuredData,
            Self::MalformedData { .. } => ErrorCode::MalformedData,
            Self::UndeterminedMode { .. } => ErrorCode::UndeterminedMode,
            Self::Extraction { .. } => ErrorCode::ExtractionFailed,
            Self::ImportFailed { .. } => ErrorCode::ImportFailed,
            Self::SchemaMismatch { .. } => ErrorCode::SchemaMismatch,
            Self::ProviderNotFound { .. } => ErrorCode::ProviderNotFound,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `immosync init` to create the database".to_string())
            }
            Self::AlreadyInitialized { path } => Some(format!(
                "Use `immosync init --force` to recreate {}",
                path.display()
            )),
            Self::NoStructuredData { .. } => Some(
                "An OpenImmo archive needs exactly one .xml file next to its attachments."
                    .to_string(),
            ),
            Self::UndeterminedMode { .. } => Some(
                "Set <uebertragung umfang=\"VOLL\"> or a modus of NEW, CHANGE or DELETE, \
                 or give every <aktion> the same aktionart."
                    .to_string(),
            ),
            Self::SchemaMismatch { table, .. } => Some(format!(
                "The `{table}` table is older than this binary. Recreate it with `immosync init`."
            )),
            Self::ProviderNotFound { key } => Some(format!(
                "No provider '{key}'. Use `immosync provider list` to see known providers."
            )),
            Self::NotAnArchive { .. }
            | Self::MalformedData { .. }
            | Self::Extraction { .. }
            | Self::ImportFailed { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Zip(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

/// Reasons a single listing entry cannot be normalized.
///
/// These are recoverable: the entry is skipped and the rest of the
/// provider's batch continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Listing does not contain a valid object ID")]
    MissingObjectId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::NotInitialized.exit_code(), 2);
        assert_eq!(
            Error::NoStructuredData {
                path: PathBuf::from("a.zip")
            }
            .exit_code(),
            3
        );
        assert_eq!(
            Error::SchemaMismatch {
                table: "listings".into(),
                column: "foo".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(Error::InvalidArgument("x".into()).exit_code(), 4);
    }

    #[test]
    fn test_structured_json_contains_hint() {
        let err = Error::UndeterminedMode {
            found: "REFERENZ".into(),
        };
        let json = err.to_structured_json();

        assert_eq!(json["error"]["code"], "UNDETERMINED_MODE");
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"]["hint"].as_str().unwrap().contains("aktionart"));
    }

    #[test]
    fn test_no_structured_data_message() {
        let err = Error::NoStructuredData {
            path: PathBuf::from("/tmp/file_with_resource.zip"),
        };
        assert_eq!(
            err.to_string(),
            "Archive \"/tmp/file_with_resource.zip\" does not contain a .xml file"
        );
    }
}
