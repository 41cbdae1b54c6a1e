//! Bidirectional record⇄row mapping
//!
//! Pure translation between [`GenericRecord`] and [`StorageRow`], driven by
//! a shared [`RecordSchema`]. No I/O happens here; validation of the schema
//! itself happened once at collection construction.

use std::sync::Arc;

use lodestone_core::{GenericRecord, LodestoneError, RecordSchema, Result};
use pgvector::Vector;

use crate::row::{StorageRow, StorageValue};

/// Schema-driven mapper between application records and storage rows
#[derive(Debug, Clone)]
pub struct RecordMapper {
    schema: Arc<RecordSchema>,
}

impl RecordMapper {
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Map an application record to a storage row
    ///
    /// The key always maps through. Data fields map only when the record
    /// carries them; absent fields are omitted, never written as NULLs.
    /// Vector fields with a non-empty value are converted to the native
    /// vector type; an empty vector becomes a storage NULL. Record entries
    /// whose names are not in the schema are ignored.
    pub fn to_storage(&self, record: &GenericRecord) -> StorageRow {
        let mut row = StorageRow::new();

        row.insert(
            self.schema.key().storage_name.clone(),
            StorageValue::Scalar(record.key.clone()),
        );

        for field in self.schema.data_fields() {
            if let Some(value) = record.data.get(&field.name) {
                row.insert(field.storage_name.clone(), StorageValue::Scalar(value.clone()));
            }
        }

        for field in self.schema.vector_fields() {
            if let Some(vector) = record.vectors.get(&field.name) {
                let value = if vector.is_empty() {
                    StorageValue::Vector(None)
                } else {
                    StorageValue::Vector(Some(Vector::from(vector.clone())))
                };
                row.insert(field.storage_name.clone(), value);
            }
        }

        row
    }

    /// Map a storage row back to an application record
    ///
    /// The key is required; a row without it fails with
    /// [`LodestoneError::Mapping`]. Data fields are copied when present and
    /// skipped otherwise. Vector fields are only populated when
    /// `include_vectors` is set: a storage NULL becomes an empty vector,
    /// anything else is converted back from the native type. Extra row
    /// columns unknown to the schema are ignored. Dimensionality is not
    /// re-validated on the read path.
    pub fn from_storage(&self, row: &StorageRow, include_vectors: bool) -> Result<GenericRecord> {
        let key = match row.get(&self.schema.key().storage_name) {
            Some(StorageValue::Scalar(value)) if !value.is_null() => value.clone(),
            _ => {
                return Err(LodestoneError::Mapping(format!(
                    "no value for key column '{}' in the row retrieved from storage",
                    self.schema.key().storage_name
                )))
            }
        };

        let mut record = GenericRecord::new(key);

        for field in self.schema.data_fields() {
            if let Some(StorageValue::Scalar(value)) = row.get(&field.storage_name) {
                record.data.insert(field.name.clone(), value.clone());
            }
        }

        if include_vectors {
            for field in self.schema.vector_fields() {
                if let Some(StorageValue::Vector(value)) = row.get(&field.storage_name) {
                    let vector = match value {
                        Some(v) => v.to_vec(),
                        None => Vec::new(),
                    };
                    record.vectors.insert(field.name.clone(), vector);
                }
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lodestone_core::{
        DataField, FieldType, KeyField, RecordDefinition, Value, VectorField,
    };
    use uuid::Uuid;

    fn mapper_for(definition: RecordDefinition) -> RecordMapper {
        RecordMapper::new(Arc::new(RecordSchema::describe(definition).unwrap()))
    }

    fn full_definition() -> RecordDefinition {
        RecordDefinition::new()
            .key(KeyField::new("id", FieldType::Int4))
            .data(DataField::new("flag", FieldType::Bool))
            .data(DataField::new("small", FieldType::Int2))
            .data(DataField::new("count", FieldType::Int4))
            .data(DataField::new("total", FieldType::Int8))
            .data(DataField::new("ratio", FieldType::Float4))
            .data(DataField::new("score", FieldType::Float8))
            .data(DataField::new("name", FieldType::Text))
            .data(DataField::new("blob", FieldType::Bytes))
            .data(DataField::new("ref_id", FieldType::Uuid))
            .data(DataField::new("seen_at", FieldType::Timestamptz))
            .data(DataField::new("extra", FieldType::Json))
            .data(DataField::new("tags", FieldType::TextArray))
            .data(DataField::new("ranks", FieldType::Int4Array))
            .data(DataField::new("weights", FieldType::Float8Array))
            .vector(VectorField::new("embedding", 4))
    }

    #[test]
    fn test_round_trip_all_field_types() {
        let mapper = mapper_for(full_definition());

        let record = GenericRecord::new(1i32)
            .with_data("flag", true)
            .with_data("small", 3i16)
            .with_data("count", 42i32)
            .with_data("total", 42_000_000_000i64)
            .with_data("ratio", 0.5f32)
            .with_data("score", 0.25f64)
            .with_data("name", "a")
            .with_data("blob", Value::Bytes(vec![1, 2, 3]))
            .with_data("ref_id", Uuid::nil())
            .with_data("seen_at", Utc.timestamp_opt(1_700_000_000, 0).unwrap())
            .with_data("extra", serde_json::json!({"k": "v"}))
            .with_data("tags", vec!["x".to_string(), "y".to_string()])
            .with_data("ranks", vec![1i32, 2, 3])
            .with_data("weights", vec![0.1f64, 0.2])
            .with_vector("embedding", vec![0.0, 1.0, 2.0, 3.0]);

        let row = mapper.to_storage(&record);
        let back = mapper.from_storage(&row, true).unwrap();

        assert_eq!(back, record);
    }

    #[test]
    fn test_vector_round_trip_is_exact() {
        let mapper = mapper_for(
            RecordDefinition::new()
                .key(KeyField::new("id", FieldType::Int8))
                .vector(VectorField::new("embedding", 3)),
        );

        let original = vec![0.1f32, -2.5, 1.0e-7];
        let record = GenericRecord::new(9i64).with_vector("embedding", original.clone());

        let row = mapper.to_storage(&record);
        let back = mapper.from_storage(&row, true).unwrap();

        assert_eq!(back.vector("embedding"), Some(original.as_slice()));
    }

    #[test]
    fn test_empty_vector_becomes_storage_null() {
        let mapper = mapper_for(
            RecordDefinition::new()
                .key(KeyField::new("id", FieldType::Int4))
                .vector(VectorField::new("embedding", 4)),
        );

        let record = GenericRecord::new(1i32).with_vector("embedding", Vec::new());
        let row = mapper.to_storage(&record);

        assert_eq!(row.get("embedding"), Some(&StorageValue::Vector(None)));
    }

    #[test]
    fn test_storage_null_vector_reads_as_empty() {
        let mapper = mapper_for(
            RecordDefinition::new()
                .key(KeyField::new("id", FieldType::Int4))
                .vector(VectorField::new("embedding", 4)),
        );

        let mut row = StorageRow::new();
        row.insert("id", StorageValue::Scalar(Value::Int4(1)));
        row.insert("embedding", StorageValue::Vector(None));

        let record = mapper.from_storage(&row, true).unwrap();
        assert_eq!(record.vector("embedding"), Some(&[][..]));
    }

    #[test]
    fn test_vectors_skipped_when_not_requested() {
        let mapper = mapper_for(
            RecordDefinition::new()
                .key(KeyField::new("id", FieldType::Int4))
                .vector(VectorField::new("embedding", 2)),
        );

        let mut row = StorageRow::new();
        row.insert("id", StorageValue::Scalar(Value::Int4(1)));
        row.insert(
            "embedding",
            StorageValue::Vector(Some(Vector::from(vec![1.0, 2.0]))),
        );

        let record = mapper.from_storage(&row, false).unwrap();
        assert!(record.vectors.is_empty());
    }

    #[test]
    fn test_absent_data_fields_are_omitted_on_write() {
        let mapper = mapper_for(
            RecordDefinition::new()
                .key(KeyField::new("id", FieldType::Int4))
                .data(DataField::new("name", FieldType::Text)),
        );

        let record = GenericRecord::new(1i32);
        let row = mapper.to_storage(&record);

        assert_eq!(row.len(), 1);
        assert!(row.get("name").is_none());
    }

    #[test]
    fn test_unknown_record_fields_are_ignored_on_write() {
        let mapper = mapper_for(
            RecordDefinition::new()
                .key(KeyField::new("id", FieldType::Int4))
                .data(DataField::new("name", FieldType::Text)),
        );

        let record = GenericRecord::new(1i32)
            .with_data("name", "a")
            .with_data("not_in_schema", "b")
            .with_vector("also_not_in_schema", vec![1.0]);

        let row = mapper.to_storage(&record);
        assert_eq!(row.len(), 2);
        assert!(row.get("not_in_schema").is_none());
    }

    #[test]
    fn test_missing_key_fails_mapping() {
        let mapper = mapper_for(
            RecordDefinition::new()
                .key(KeyField::new("id", FieldType::Int4))
                .data(DataField::new("name", FieldType::Text)),
        );

        let mut row = StorageRow::new();
        row.insert("name", StorageValue::Scalar(Value::Text("a".to_string())));

        let err = mapper.from_storage(&row, true).unwrap_err();
        assert!(matches!(err, LodestoneError::Mapping(_)));
    }

    #[test]
    fn test_null_key_fails_mapping() {
        let mapper = mapper_for(
            RecordDefinition::new().key(KeyField::new("id", FieldType::Int4)),
        );

        let mut row = StorageRow::new();
        row.insert("id", StorageValue::Scalar(Value::Null));

        let err = mapper.from_storage(&row, true).unwrap_err();
        assert!(matches!(err, LodestoneError::Mapping(_)));
    }

    #[test]
    fn test_unknown_row_columns_are_ignored_on_read() {
        let mapper = mapper_for(
            RecordDefinition::new().key(KeyField::new("id", FieldType::Int4)),
        );

        let mut row = StorageRow::new();
        row.insert("id", StorageValue::Scalar(Value::Int4(1)));
        row.insert("leftover", StorageValue::Scalar(Value::Text("x".to_string())));

        let record = mapper.from_storage(&row, true).unwrap();
        assert_eq!(record.key, Value::Int4(1));
        assert!(record.data.is_empty());
    }

    #[test]
    fn test_storage_name_mapping() {
        let mapper = mapper_for(
            RecordDefinition::new()
                .key(KeyField::new("id", FieldType::Int4).with_storage_name("pk"))
                .data(DataField::new("name", FieldType::Text).with_storage_name("display_name")),
        );

        let record = GenericRecord::new(5i32).with_data("name", "a");
        let row = mapper.to_storage(&record);

        assert!(row.get("pk").is_some());
        assert!(row.get("display_name").is_some());
        assert!(row.get("name").is_none());

        let back = mapper.from_storage(&row, true).unwrap();
        assert_eq!(back.data("name"), Some(&Value::Text("a".to_string())));
    }
}
