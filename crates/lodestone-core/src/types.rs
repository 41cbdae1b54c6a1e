//! Field and value types supported by the storage layer
//!
//! Every type the connector can persist has one `FieldType` variant and one
//! matching `Value` variant. Types outside this set are unrepresentable, so
//! per-row mapping never has to re-check them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Field Types
// ============================================================================

/// Storage-side type of a key or data field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Text,
    Bytes,
    Uuid,
    Timestamptz,
    Json,
    BoolArray,
    Int4Array,
    Int8Array,
    Float4Array,
    Float8Array,
    TextArray,
}

impl FieldType {
    /// PostgreSQL type name used in DDL
    pub fn postgres_type(&self) -> &'static str {
        match self {
            Self::Bool => "BOOLEAN",
            Self::Int2 => "SMALLINT",
            Self::Int4 => "INTEGER",
            Self::Int8 => "BIGINT",
            Self::Float4 => "REAL",
            Self::Float8 => "DOUBLE PRECISION",
            Self::Text => "TEXT",
            Self::Bytes => "BYTEA",
            Self::Uuid => "UUID",
            Self::Timestamptz => "TIMESTAMPTZ",
            Self::Json => "JSONB",
            Self::BoolArray => "BOOLEAN[]",
            Self::Int4Array => "INTEGER[]",
            Self::Int8Array => "BIGINT[]",
            Self::Float4Array => "REAL[]",
            Self::Float8Array => "DOUBLE PRECISION[]",
            Self::TextArray => "TEXT[]",
        }
    }

    /// Element type of a list type, `None` for scalars
    pub fn element_type(&self) -> Option<FieldType> {
        match self {
            Self::BoolArray => Some(Self::Bool),
            Self::Int4Array => Some(Self::Int4),
            Self::Int8Array => Some(Self::Int8),
            Self::Float4Array => Some(Self::Float4),
            Self::Float8Array => Some(Self::Float8),
            Self::TextArray => Some(Self::Text),
            _ => None,
        }
    }

    /// Whether this is a list (array) type
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Self::BoolArray
                | Self::Int4Array
                | Self::Int8Array
                | Self::Float4Array
                | Self::Float8Array
                | Self::TextArray
        )
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.postgres_type().to_lowercase())
    }
}

// ============================================================================
// Values
// ============================================================================

/// A runtime value for a key or data field
///
/// One variant per supported [`FieldType`], plus `Null`. Used by the generic
/// record path where field types are only known at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamptz(DateTime<Utc>),
    Json(serde_json::Value),
    BoolArray(Vec<bool>),
    Int4Array(Vec<i32>),
    Int8Array(Vec<i64>),
    Float4Array(Vec<f32>),
    Float8Array(Vec<f64>),
    TextArray(Vec<String>),
}

impl Value {
    /// The field type this value carries, or `None` for `Null`
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(FieldType::Bool),
            Self::Int2(_) => Some(FieldType::Int2),
            Self::Int4(_) => Some(FieldType::Int4),
            Self::Int8(_) => Some(FieldType::Int8),
            Self::Float4(_) => Some(FieldType::Float4),
            Self::Float8(_) => Some(FieldType::Float8),
            Self::Text(_) => Some(FieldType::Text),
            Self::Bytes(_) => Some(FieldType::Bytes),
            Self::Uuid(_) => Some(FieldType::Uuid),
            Self::Timestamptz(_) => Some(FieldType::Timestamptz),
            Self::Json(_) => Some(FieldType::Json),
            Self::BoolArray(_) => Some(FieldType::BoolArray),
            Self::Int4Array(_) => Some(FieldType::Int4Array),
            Self::Int8Array(_) => Some(FieldType::Int8Array),
            Self::Float4Array(_) => Some(FieldType::Float4Array),
            Self::Float8Array(_) => Some(FieldType::Float8Array),
            Self::TextArray(_) => Some(FieldType::TextArray),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Int2(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int4(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int8(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float4(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float8(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamptz(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Self::TextArray(v)
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Self::Int4Array(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Self::Int8Array(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Self::Float8Array(v)
    }
}

// ============================================================================
// Vector Metadata
// ============================================================================

/// Similarity metric attached to a vector field
///
/// Determines the pgvector operator used for ordering and how the raw
/// operator result is converted into the reported score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceFunction {
    /// Cosine distance; lower is closer. Score is the raw distance.
    #[default]
    CosineDistance,
    /// Cosine similarity; score is `1 - distance`, higher is closer.
    CosineSimilarity,
    /// Dot product similarity; pgvector returns the negated inner product.
    DotProduct,
    /// Euclidean (L2) distance; lower is closer.
    Euclidean,
}

impl DistanceFunction {
    /// pgvector ordering operator
    pub fn operator(&self) -> &'static str {
        match self {
            Self::CosineDistance | Self::CosineSimilarity => "<=>",
            Self::DotProduct => "<#>",
            Self::Euclidean => "<->",
        }
    }

    /// Convert the raw operator result into the reported score
    pub fn score(&self, raw: f64) -> f64 {
        match self {
            Self::CosineDistance | Self::Euclidean => raw,
            Self::CosineSimilarity => 1.0 - raw,
            // `<#>` yields the negated inner product; undo the negation.
            Self::DotProduct => -raw,
        }
    }

    /// pgvector operator class used when creating an index
    pub fn index_opclass(&self) -> &'static str {
        match self {
            Self::CosineDistance | Self::CosineSimilarity => "vector_cosine_ops",
            Self::DotProduct => "vector_ip_ops",
            Self::Euclidean => "vector_l2_ops",
        }
    }
}

/// Index structure created for a vector field at collection creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// HNSW graph index
    #[default]
    Hnsw,
    /// IVFFlat inverted-list index
    IvfFlat,
    /// No index; exact scan
    None,
}

impl IndexKind {
    /// pgvector index method name, or `None` for exact scan
    pub fn method(&self) -> Option<&'static str> {
        match self {
            Self::Hnsw => Some("hnsw"),
            Self::IvfFlat => Some("ivfflat"),
            Self::None => None,
        }
    }
}
