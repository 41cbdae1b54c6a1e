//! Lodestone Core - Schema model, record types, and shared infrastructure
//!
//! This crate defines the abstractions shared by the Lodestone connector:
//! - Field and value types supported by the storage layer
//! - Record schema definition and validation
//! - The generic (loosely typed) data record
//! - Common error types
//! - Connection settings

pub mod config;
pub mod schema;
pub mod types;

pub use config::{ConfigError, PgSettings, DEFAULT_DB_SCHEMA};
pub use schema::{
    DataField, FieldDefinition, GenericRecord, KeyField, RecordDefinition, RecordSchema,
    StoreRecord, VectorField, MAX_DIMENSIONALITY,
};
pub use types::{DistanceFunction, FieldType, IndexKind, Value};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Lodestone operations
#[derive(Error, Debug)]
pub enum LodestoneError {
    /// Conflicting or missing connection/auth configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid or ambiguous record schema, detected at collection construction.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Key type outside the supported set (int4, int8, uuid, text).
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// A storage row could not be mapped back to a record.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// The identity provider failed to produce a token.
    #[error("Token error: {0}")]
    Token(String),

    /// Transport/database errors, passed through from the driver unmodified.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for LodestoneError {
    fn from(err: ConfigError) -> Self {
        LodestoneError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LodestoneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LodestoneError::UnsupportedKeyType("float8".to_string());
        assert_eq!(err.to_string(), "Unsupported key type: float8");

        let err = LodestoneError::Schema("two key fields".to_string());
        assert!(err.to_string().starts_with("Schema error"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: LodestoneError = ConfigError::MissingRequired("dbname".to_string()).into();
        assert!(matches!(err, LodestoneError::Configuration(_)));
    }
}
