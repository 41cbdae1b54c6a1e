//! Record schema definition and validation
//!
//! A [`RecordDefinition`] is the hand-built (or trait-derived) declaration of
//! a record type's key, data, and vector fields. [`RecordSchema::describe`]
//! validates it once, at collection construction, and produces the immutable
//! descriptor every mapping operation reads from.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{DistanceFunction, FieldType, IndexKind, Value};
use crate::{LodestoneError, Result};

/// Maximum dimensionality pgvector can index
pub const MAX_DIMENSIONALITY: u32 = 2000;

// ============================================================================
// Field Definitions
// ============================================================================

/// The key field of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyField {
    /// Field name on the application record
    pub name: String,
    /// Column name in storage
    pub storage_name: String,
    /// Storage type of the key
    pub field_type: FieldType,
}

impl KeyField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            storage_name: name.clone(),
            name,
            field_type,
        }
    }

    /// Override the storage column name
    pub fn with_storage_name(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = storage_name.into();
        self
    }
}

/// A scalar or list data field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataField {
    pub name: String,
    pub storage_name: String,
    pub field_type: FieldType,
    /// Whether the column allows NULL. Defaults to true.
    pub nullable: bool,
}

impl DataField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            storage_name: name.clone(),
            name,
            field_type,
            nullable: true,
        }
    }

    pub fn with_storage_name(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = storage_name.into();
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Whether this field holds a list of scalars
    pub fn is_list(&self) -> bool {
        self.field_type.is_list()
    }
}

/// A vector (embedding) field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorField {
    pub name: String,
    pub storage_name: String,
    /// Number of dimensions, fixed per field
    pub dimensions: u32,
    /// Similarity metric used for search ordering and index creation
    pub distance: DistanceFunction,
    /// Index structure created for this field
    pub index: IndexKind,
}

impl VectorField {
    pub fn new(name: impl Into<String>, dimensions: u32) -> Self {
        let name = name.into();
        Self {
            storage_name: name.clone(),
            name,
            dimensions,
            distance: DistanceFunction::default(),
            index: IndexKind::default(),
        }
    }

    pub fn with_storage_name(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = storage_name.into();
        self
    }

    pub fn with_distance(mut self, distance: DistanceFunction) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_index(mut self, index: IndexKind) -> Self {
        self.index = index;
        self
    }
}

/// A field declaration with its kind tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDefinition {
    Key(KeyField),
    Data(DataField),
    Vector(VectorField),
}

impl FieldDefinition {
    /// Storage column name of this field
    pub fn storage_name(&self) -> &str {
        match self {
            Self::Key(f) => &f.storage_name,
            Self::Data(f) => &f.storage_name,
            Self::Vector(f) => &f.storage_name,
        }
    }
}

// ============================================================================
// Record Definition
// ============================================================================

/// Ordered list of field declarations for one record type
///
/// Built by hand for the dynamic path, or supplied by a [`StoreRecord`]
/// implementation for the typed path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDefinition {
    pub fields: Vec<FieldDefinition>,
}

impl RecordDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, field: KeyField) -> Self {
        self.fields.push(FieldDefinition::Key(field));
        self
    }

    pub fn data(mut self, field: DataField) -> Self {
        self.fields.push(FieldDefinition::Data(field));
        self
    }

    pub fn vector(mut self, field: VectorField) -> Self {
        self.fields.push(FieldDefinition::Vector(field));
        self
    }
}

// ============================================================================
// Record Schema
// ============================================================================

/// Validated, immutable description of a record type
///
/// Built once per collection via [`RecordSchema::describe`] and shared
/// read-only across all mapping operations. Per-row mapping assumes the
/// schema is valid; nothing is re-validated per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    key: KeyField,
    data: Vec<DataField>,
    vectors: Vec<VectorField>,
}

impl RecordSchema {
    /// Validate a definition and produce the descriptor
    ///
    /// Fails with [`LodestoneError::Schema`] when the definition has no key
    /// field or more than one, a vector field with out-of-range
    /// dimensionality, or duplicate storage column names.
    pub fn describe(definition: RecordDefinition) -> Result<Self> {
        let mut key: Option<KeyField> = None;
        let mut data = Vec::new();
        let mut vectors = Vec::new();

        for field in definition.fields {
            match field {
                FieldDefinition::Key(f) => {
                    if let Some(existing) = &key {
                        return Err(LodestoneError::Schema(format!(
                            "multiple key fields declared: '{}' and '{}'",
                            existing.name, f.name
                        )));
                    }
                    key = Some(f);
                }
                FieldDefinition::Data(f) => data.push(f),
                FieldDefinition::Vector(f) => {
                    if f.dimensions == 0 {
                        return Err(LodestoneError::Schema(format!(
                            "vector field '{}' must have at least one dimension",
                            f.name
                        )));
                    }
                    if f.dimensions > MAX_DIMENSIONALITY {
                        return Err(LodestoneError::Schema(format!(
                            "vector field '{}' has {} dimensions, maximum is {}",
                            f.name, f.dimensions, MAX_DIMENSIONALITY
                        )));
                    }
                    vectors.push(f);
                }
            }
        }

        let key = key.ok_or_else(|| {
            LodestoneError::Schema("record definition has no key field".to_string())
        })?;

        let mut seen = HashSet::new();
        for storage_name in std::iter::once(key.storage_name.as_str())
            .chain(data.iter().map(|f| f.storage_name.as_str()))
            .chain(vectors.iter().map(|f| f.storage_name.as_str()))
        {
            if !seen.insert(storage_name) {
                return Err(LodestoneError::Schema(format!(
                    "duplicate storage column name '{storage_name}'"
                )));
            }
        }

        Ok(Self { key, data, vectors })
    }

    pub fn key(&self) -> &KeyField {
        &self.key
    }

    pub fn data_fields(&self) -> &[DataField] {
        &self.data
    }

    pub fn vector_fields(&self) -> &[VectorField] {
        &self.vectors
    }

    /// Look up a vector field by its application-side name
    pub fn vector_field(&self, name: &str) -> Option<&VectorField> {
        self.vectors.iter().find(|f| f.name == name)
    }

    /// Look up a data field by its application-side name
    pub fn data_field(&self, name: &str) -> Option<&DataField> {
        self.data.iter().find(|f| f.name == name)
    }

    /// All storage column names, key first, in declaration order
    pub fn storage_columns(&self) -> Vec<&str> {
        std::iter::once(self.key.storage_name.as_str())
            .chain(self.data.iter().map(|f| f.storage_name.as_str()))
            .chain(self.vectors.iter().map(|f| f.storage_name.as_str()))
            .collect()
    }
}

// ============================================================================
// Generic Record
// ============================================================================

/// A loosely typed record: a key plus open-ended data and vector bags
///
/// Field names must match the collection's schema for mapping to pick them
/// up; unknown names are ignored on write, not errors. A vector entry with
/// an empty `Vec<f32>` stands for a null/absent vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericRecord {
    pub key: Value,
    pub data: HashMap<String, Value>,
    pub vectors: HashMap<String, Vec<f32>>,
}

impl GenericRecord {
    pub fn new(key: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            data: HashMap::new(),
            vectors: HashMap::new(),
        }
    }

    pub fn with_data(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn with_vector(mut self, name: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(name.into(), vector);
        self
    }

    pub fn data(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn vector(&self, name: &str) -> Option<&[f32]> {
        self.vectors.get(name).map(|v| v.as_slice())
    }
}

// ============================================================================
// Typed Records
// ============================================================================

/// A strongly typed record that can describe its own schema
///
/// The typed path reuses the generic mapper: a `StoreRecord` converts itself
/// to and from [`GenericRecord`], and its [`RecordDefinition`] goes through
/// the same [`RecordSchema::describe`] validation.
pub trait StoreRecord: Sized + Send + Sync {
    /// Field declarations for this record type
    fn definition() -> RecordDefinition;

    /// Convert into the generic representation
    fn into_record(self) -> GenericRecord;

    /// Rebuild from the generic representation
    ///
    /// Fails with [`LodestoneError::Mapping`] when a required field is
    /// missing or carries the wrong value variant.
    fn from_record(record: GenericRecord) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_definition() -> RecordDefinition {
        RecordDefinition::new()
            .key(KeyField::new("id", FieldType::Int4))
            .data(DataField::new("name", FieldType::Text))
            .data(DataField::new("tags", FieldType::TextArray))
            .vector(VectorField::new("embedding", 4))
    }

    #[test]
    fn test_describe_valid_definition() {
        let schema = RecordSchema::describe(sample_definition()).unwrap();
        assert_eq!(schema.key().name, "id");
        assert_eq!(schema.data_fields().len(), 2);
        assert_eq!(schema.vector_fields().len(), 1);
        assert_eq!(
            schema.storage_columns(),
            vec!["id", "name", "tags", "embedding"]
        );
    }

    #[test]
    fn test_describe_rejects_two_keys() {
        let definition = RecordDefinition::new()
            .key(KeyField::new("id", FieldType::Int4))
            .key(KeyField::new("other_id", FieldType::Text));

        let err = RecordSchema::describe(definition).unwrap_err();
        assert!(matches!(err, LodestoneError::Schema(_)));
    }

    #[test]
    fn test_describe_rejects_missing_key() {
        let definition =
            RecordDefinition::new().data(DataField::new("name", FieldType::Text));

        let err = RecordSchema::describe(definition).unwrap_err();
        assert!(matches!(err, LodestoneError::Schema(_)));
    }

    #[test]
    fn test_describe_rejects_zero_dimensions() {
        let definition = RecordDefinition::new()
            .key(KeyField::new("id", FieldType::Int4))
            .vector(VectorField::new("embedding", 0));

        let err = RecordSchema::describe(definition).unwrap_err();
        assert!(matches!(err, LodestoneError::Schema(_)));
    }

    #[test]
    fn test_describe_rejects_oversized_dimensions() {
        let definition = RecordDefinition::new()
            .key(KeyField::new("id", FieldType::Int4))
            .vector(VectorField::new("embedding", MAX_DIMENSIONALITY + 1));

        let err = RecordSchema::describe(definition).unwrap_err();
        assert!(matches!(err, LodestoneError::Schema(_)));
    }

    #[test]
    fn test_describe_rejects_duplicate_storage_names() {
        let definition = RecordDefinition::new()
            .key(KeyField::new("id", FieldType::Int4))
            .data(DataField::new("name", FieldType::Text))
            .data(DataField::new("other", FieldType::Text).with_storage_name("name"));

        let err = RecordSchema::describe(definition).unwrap_err();
        assert!(matches!(err, LodestoneError::Schema(_)));
    }

    #[test]
    fn test_storage_name_override() {
        let definition = RecordDefinition::new()
            .key(KeyField::new("id", FieldType::Int8).with_storage_name("pk"))
            .vector(VectorField::new("embedding", 8).with_storage_name("vec"));

        let schema = RecordSchema::describe(definition).unwrap();
        assert_eq!(schema.key().storage_name, "pk");
        assert_eq!(schema.vector_field("embedding").unwrap().storage_name, "vec");
    }

    #[test]
    fn test_generic_record_builder() {
        let record = GenericRecord::new(1i32)
            .with_data("name", "a")
            .with_vector("embedding", vec![0.0, 0.0, 0.0, 0.0]);

        assert_eq!(record.key, Value::Int4(1));
        assert_eq!(record.data("name"), Some(&Value::Text("a".to_string())));
        assert_eq!(record.vector("embedding"), Some(&[0.0f32; 4][..]));
        assert_eq!(record.vector("missing"), None);
    }
}
