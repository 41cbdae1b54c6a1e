//! sqlx implementation of the database client
//!
//! All SQL lives here. Identifiers are validated before being quoted into
//! statements; values are always bound, never interpolated.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use lodestone_core::{FieldType, LodestoneError, RecordSchema, Result, Value, VectorField};
use pgvector::Vector;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info};

use crate::collection::{FilterClause, SearchOptions};
use crate::row::{StorageRow, StorageValue};
use crate::VectorStoreDbClient;

/// Maximum number of rows or keys sent in a single statement
pub const MAX_KEYS_PER_BATCH: usize = 1000;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Postgres + pgvector client over a shared connection pool
pub struct PgVectorClient {
    pool: PgPool,
    db_schema: String,
}

impl PgVectorClient {
    /// Create a client targeting one schema (namespace)
    pub fn new(pool: PgPool, db_schema: impl Into<String>) -> Self {
        Self {
            pool,
            db_schema: db_schema.into(),
        }
    }

    /// The underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The schema tables are created in
    pub fn db_schema(&self) -> &str {
        &self.db_schema
    }

    fn qualified(&self, table: &str) -> Result<String> {
        validate_identifier(&self.db_schema)?;
        validate_identifier(table)?;
        Ok(format!(
            "{}.{}",
            quote_ident(&self.db_schema),
            quote_ident(table)
        ))
    }
}

#[async_trait]
impl VectorStoreDbClient for PgVectorClient {
    fn get_tables(&self) -> BoxStream<'_, Result<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
        )
        .bind(self.db_schema.clone())
        .fetch(&self.pool)
        .map_err(LodestoneError::from)
        .boxed()
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let found: Option<String> = sqlx::query_scalar(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = $1 AND table_name = $2",
        )
        .bind(&self.db_schema)
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    async fn create_table(
        &self,
        table: &str,
        schema: &RecordSchema,
        if_not_exists: bool,
    ) -> Result<()> {
        let qualified = self.qualified(table)?;
        validate_schema_identifiers(schema)?;

        if !schema.vector_fields().is_empty() {
            sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
                .execute(&self.pool)
                .await?;
        }

        let create = build_create_table_sql(&qualified, schema, if_not_exists);
        sqlx::query(&create).execute(&self.pool).await?;

        for field in schema.vector_fields() {
            if let Some(index) = build_index_sql(&qualified, table, field) {
                sqlx::query(&index).execute(&self.pool).await?;
            }
        }

        info!(table, db_schema = %self.db_schema, "created table");
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let qualified = self.qualified(table)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {qualified} CASCADE"))
            .execute(&self.pool)
            .await?;

        info!(table, db_schema = %self.db_schema, "dropped table");
        Ok(())
    }

    async fn get_rows(
        &self,
        table: &str,
        schema: &RecordSchema,
        keys: &[Value],
        include_vectors: bool,
    ) -> Result<Vec<StorageRow>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let qualified = self.qualified(table)?;
        validate_schema_identifiers(schema)?;

        let sql = format!(
            "SELECT {} FROM {qualified} WHERE {} = ANY($1)",
            select_columns(schema, include_vectors),
            quote_ident(&schema.key().storage_name),
        );

        let query = bind_keys(sqlx::query(&sql), schema.key().field_type, keys)?;
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| read_row(row, schema, include_vectors))
            .collect()
    }

    async fn upsert_rows(
        &self,
        table: &str,
        schema: &RecordSchema,
        rows: Vec<StorageRow>,
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let qualified = self.qualified(table)?;
        validate_schema_identifiers(schema)?;

        let mut tx = self.pool.begin().await?;

        for batch in rows.chunks(MAX_KEYS_PER_BATCH) {
            let sql = build_upsert_sql(&qualified, schema, batch.len());
            let mut query = sqlx::query(&sql);
            for row in batch {
                query = bind_row(query, schema, row)?;
            }
            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;

        debug!(table, rows = rows.len(), "upserted rows");
        Ok(())
    }

    async fn delete_rows(
        &self,
        table: &str,
        schema: &RecordSchema,
        keys: &[Value],
    ) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let qualified = self.qualified(table)?;

        let sql = format!(
            "DELETE FROM {qualified} WHERE {} = ANY($1)",
            quote_ident(&schema.key().storage_name),
        );

        let mut tx = self.pool.begin().await?;

        for batch in keys.chunks(MAX_KEYS_PER_BATCH) {
            let query = bind_keys(sqlx::query(&sql), schema.key().field_type, batch)?;
            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;

        debug!(table, keys = keys.len(), "deleted rows");
        Ok(())
    }

    async fn search(
        &self,
        table: &str,
        schema: &RecordSchema,
        vector_field: &VectorField,
        query: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<(StorageRow, f64)>> {
        let qualified = self.qualified(table)?;
        validate_schema_identifiers(schema)?;

        let (sql, filter_binds) = build_search_sql(&qualified, schema, vector_field, options)?;

        let mut q = sqlx::query(&sql).bind(Vector::from(query.to_vec()));
        for (field_type, value) in &filter_binds {
            q = bind_scalar(q, *field_type, Some(value))?;
        }
        q = q.bind(options.limit as i64);

        let rows = q.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let raw: f64 = row.try_get(SCORE_ALIAS)?;
                let storage = read_row(row, schema, options.include_vectors)?;
                Ok((storage, vector_field.distance.score(raw)))
            })
            .collect()
    }
}

// ============================================================================
// SQL Construction
// ============================================================================

const SCORE_ALIAS: &str = "_score";

fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(LodestoneError::Schema(format!(
            "invalid identifier '{name}': only alphanumeric characters and underscores are allowed"
        )))
    }
}

fn validate_schema_identifiers(schema: &RecordSchema) -> Result<()> {
    for column in schema.storage_columns() {
        validate_identifier(column)?;
    }
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

fn select_columns(schema: &RecordSchema, include_vectors: bool) -> String {
    let mut columns = vec![quote_ident(&schema.key().storage_name)];
    columns.extend(schema.data_fields().iter().map(|f| quote_ident(&f.storage_name)));
    if include_vectors {
        columns.extend(
            schema
                .vector_fields()
                .iter()
                .map(|f| quote_ident(&f.storage_name)),
        );
    }
    columns.join(", ")
}

fn build_create_table_sql(qualified: &str, schema: &RecordSchema, if_not_exists: bool) -> String {
    let mut columns = Vec::new();

    let key = schema.key();
    columns.push(format!(
        "{} {} PRIMARY KEY",
        quote_ident(&key.storage_name),
        key.field_type.postgres_type()
    ));

    for field in schema.data_fields() {
        let mut column = format!(
            "{} {}",
            quote_ident(&field.storage_name),
            field.field_type.postgres_type()
        );
        if !field.nullable {
            column.push_str(" NOT NULL");
        }
        columns.push(column);
    }

    for field in schema.vector_fields() {
        columns.push(format!(
            "{} VECTOR({})",
            quote_ident(&field.storage_name),
            field.dimensions
        ));
    }

    let exists_clause = if if_not_exists { "IF NOT EXISTS " } else { "" };
    format!(
        "CREATE TABLE {exists_clause}{qualified} ({})",
        columns.join(", ")
    )
}

fn build_index_sql(qualified: &str, table: &str, field: &VectorField) -> Option<String> {
    let method = field.index.method()?;
    let index_name = quote_ident(&format!("idx_{}_{}", table, field.storage_name));

    Some(format!(
        "CREATE INDEX IF NOT EXISTS {index_name} ON {qualified} USING {method} ({} {})",
        quote_ident(&field.storage_name),
        field.distance.index_opclass(),
    ))
}

fn build_upsert_sql(qualified: &str, schema: &RecordSchema, row_count: usize) -> String {
    let columns = schema.storage_columns();
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let groups = (0..row_count)
        .map(|row| {
            let placeholders = (0..columns.len())
                .map(|col| format!("${}", row * columns.len() + col + 1))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({placeholders})")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let key = quote_ident(&schema.key().storage_name);
    let updates = columns
        .iter()
        .filter(|c| **c != schema.key().storage_name)
        .map(|c| {
            let quoted = quote_ident(c);
            format!("{quoted} = EXCLUDED.{quoted}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let conflict = if updates.is_empty() {
        format!("ON CONFLICT ({key}) DO NOTHING")
    } else {
        format!("ON CONFLICT ({key}) DO UPDATE SET {updates}")
    };

    format!("INSERT INTO {qualified} ({column_list}) VALUES {groups} {conflict}")
}

fn build_search_sql(
    qualified: &str,
    schema: &RecordSchema,
    vector_field: &VectorField,
    options: &SearchOptions,
) -> Result<(String, Vec<(FieldType, Value)>)> {
    let operator = vector_field.distance.operator();
    let vector_column = quote_ident(&vector_field.storage_name);

    let mut sql = format!(
        "SELECT {}, ({vector_column} {operator} $1::vector) AS {SCORE_ALIAS} FROM {qualified}",
        select_columns(schema, options.include_vectors),
    );

    let mut binds: Vec<(FieldType, Value)> = Vec::new();

    if let Some(filter) = &options.filter {
        let mut clauses = Vec::new();
        for clause in &filter.clauses {
            match clause {
                FilterClause::Equal { field, value } => {
                    let data_field = schema.data_field(field).ok_or_else(|| {
                        LodestoneError::Schema(format!("unknown filter field '{field}'"))
                    })?;
                    binds.push((data_field.field_type, value.clone()));
                    clauses.push(format!(
                        "{} = ${}",
                        quote_ident(&data_field.storage_name),
                        binds.len() + 1
                    ));
                }
                FilterClause::AnyTagEqual { field, value } => {
                    let data_field = schema.data_field(field).ok_or_else(|| {
                        LodestoneError::Schema(format!("unknown filter field '{field}'"))
                    })?;
                    let element = data_field.field_type.element_type().ok_or_else(|| {
                        LodestoneError::Schema(format!(
                            "filter field '{field}' is not a list type"
                        ))
                    })?;
                    binds.push((element, value.clone()));
                    clauses.push(format!(
                        "${} = ANY({})",
                        binds.len() + 1,
                        quote_ident(&data_field.storage_name)
                    ));
                }
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
    }

    sql.push_str(&format!(
        " ORDER BY {vector_column} {operator} $1::vector LIMIT ${}",
        binds.len() + 2
    ));

    Ok((sql, binds))
}

// ============================================================================
// Value Binding and Reading
// ============================================================================

fn bind_null(query: PgQuery<'_>, field_type: FieldType) -> PgQuery<'_> {
    match field_type {
        FieldType::Bool => query.bind(None::<bool>),
        FieldType::Int2 => query.bind(None::<i16>),
        FieldType::Int4 => query.bind(None::<i32>),
        FieldType::Int8 => query.bind(None::<i64>),
        FieldType::Float4 => query.bind(None::<f32>),
        FieldType::Float8 => query.bind(None::<f64>),
        FieldType::Text => query.bind(None::<String>),
        FieldType::Bytes => query.bind(None::<Vec<u8>>),
        FieldType::Uuid => query.bind(None::<uuid::Uuid>),
        FieldType::Timestamptz => query.bind(None::<chrono::DateTime<chrono::Utc>>),
        FieldType::Json => query.bind(None::<serde_json::Value>),
        FieldType::BoolArray => query.bind(None::<Vec<bool>>),
        FieldType::Int4Array => query.bind(None::<Vec<i32>>),
        FieldType::Int8Array => query.bind(None::<Vec<i64>>),
        FieldType::Float4Array => query.bind(None::<Vec<f32>>),
        FieldType::Float8Array => query.bind(None::<Vec<f64>>),
        FieldType::TextArray => query.bind(None::<Vec<String>>),
    }
}

fn bind_scalar<'q>(
    query: PgQuery<'q>,
    field_type: FieldType,
    value: Option<&Value>,
) -> Result<PgQuery<'q>> {
    let value = match value {
        None | Some(Value::Null) => return Ok(bind_null(query, field_type)),
        Some(value) => value,
    };

    let query = match (field_type, value) {
        (FieldType::Bool, Value::Bool(v)) => query.bind(*v),
        (FieldType::Int2, Value::Int2(v)) => query.bind(*v),
        (FieldType::Int4, Value::Int4(v)) => query.bind(*v),
        (FieldType::Int8, Value::Int8(v)) => query.bind(*v),
        (FieldType::Float4, Value::Float4(v)) => query.bind(*v),
        (FieldType::Float8, Value::Float8(v)) => query.bind(*v),
        (FieldType::Text, Value::Text(v)) => query.bind(v.clone()),
        (FieldType::Bytes, Value::Bytes(v)) => query.bind(v.clone()),
        (FieldType::Uuid, Value::Uuid(v)) => query.bind(*v),
        (FieldType::Timestamptz, Value::Timestamptz(v)) => query.bind(*v),
        (FieldType::Json, Value::Json(v)) => query.bind(v.clone()),
        (FieldType::BoolArray, Value::BoolArray(v)) => query.bind(v.clone()),
        (FieldType::Int4Array, Value::Int4Array(v)) => query.bind(v.clone()),
        (FieldType::Int8Array, Value::Int8Array(v)) => query.bind(v.clone()),
        (FieldType::Float4Array, Value::Float4Array(v)) => query.bind(v.clone()),
        (FieldType::Float8Array, Value::Float8Array(v)) => query.bind(v.clone()),
        (FieldType::TextArray, Value::TextArray(v)) => query.bind(v.clone()),
        (expected, actual) => {
            let actual = actual
                .field_type()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "null".to_string());
            return Err(LodestoneError::Mapping(format!(
                "value of type {actual} does not match declared field type {expected}"
            )));
        }
    };

    Ok(query)
}

fn bind_row<'q>(
    mut query: PgQuery<'q>,
    schema: &RecordSchema,
    row: &StorageRow,
) -> Result<PgQuery<'q>> {
    let key = schema.key();
    query = match row.get(&key.storage_name) {
        Some(StorageValue::Scalar(value)) => bind_scalar(query, key.field_type, Some(value))?,
        _ => bind_scalar(query, key.field_type, None)?,
    };

    for field in schema.data_fields() {
        query = match row.get(&field.storage_name) {
            Some(StorageValue::Scalar(value)) => {
                bind_scalar(query, field.field_type, Some(value))?
            }
            Some(StorageValue::Vector(_)) => {
                return Err(LodestoneError::Mapping(format!(
                    "vector value bound to scalar column '{}'",
                    field.storage_name
                )))
            }
            None => bind_scalar(query, field.field_type, None)?,
        };
    }

    for field in schema.vector_fields() {
        query = match row.get(&field.storage_name) {
            Some(StorageValue::Vector(value)) => query.bind(value.clone()),
            Some(StorageValue::Scalar(Value::Null)) | None => query.bind(None::<Vector>),
            Some(StorageValue::Scalar(_)) => {
                return Err(LodestoneError::Mapping(format!(
                    "scalar value bound to vector column '{}'",
                    field.storage_name
                )))
            }
        };
    }

    Ok(query)
}

fn read_scalar(row: &PgRow, name: &str, field_type: FieldType) -> Result<Value> {
    let value = match field_type {
        FieldType::Bool => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        FieldType::Int2 => row.try_get::<Option<i16>, _>(name)?.map(Value::Int2),
        FieldType::Int4 => row.try_get::<Option<i32>, _>(name)?.map(Value::Int4),
        FieldType::Int8 => row.try_get::<Option<i64>, _>(name)?.map(Value::Int8),
        FieldType::Float4 => row.try_get::<Option<f32>, _>(name)?.map(Value::Float4),
        FieldType::Float8 => row.try_get::<Option<f64>, _>(name)?.map(Value::Float8),
        FieldType::Text => row.try_get::<Option<String>, _>(name)?.map(Value::Text),
        FieldType::Bytes => row.try_get::<Option<Vec<u8>>, _>(name)?.map(Value::Bytes),
        FieldType::Uuid => row.try_get::<Option<uuid::Uuid>, _>(name)?.map(Value::Uuid),
        FieldType::Timestamptz => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(Value::Timestamptz),
        FieldType::Json => row
            .try_get::<Option<serde_json::Value>, _>(name)?
            .map(Value::Json),
        FieldType::BoolArray => row
            .try_get::<Option<Vec<bool>>, _>(name)?
            .map(Value::BoolArray),
        FieldType::Int4Array => row
            .try_get::<Option<Vec<i32>>, _>(name)?
            .map(Value::Int4Array),
        FieldType::Int8Array => row
            .try_get::<Option<Vec<i64>>, _>(name)?
            .map(Value::Int8Array),
        FieldType::Float4Array => row
            .try_get::<Option<Vec<f32>>, _>(name)?
            .map(Value::Float4Array),
        FieldType::Float8Array => row
            .try_get::<Option<Vec<f64>>, _>(name)?
            .map(Value::Float8Array),
        FieldType::TextArray => row
            .try_get::<Option<Vec<String>>, _>(name)?
            .map(Value::TextArray),
    };

    Ok(value.unwrap_or(Value::Null))
}

fn read_row(row: &PgRow, schema: &RecordSchema, include_vectors: bool) -> Result<StorageRow> {
    let mut out = StorageRow::new();

    let key = schema.key();
    out.insert(
        key.storage_name.clone(),
        StorageValue::Scalar(read_scalar(row, &key.storage_name, key.field_type)?),
    );

    for field in schema.data_fields() {
        out.insert(
            field.storage_name.clone(),
            StorageValue::Scalar(read_scalar(row, &field.storage_name, field.field_type)?),
        );
    }

    if include_vectors {
        for field in schema.vector_fields() {
            let value: Option<Vector> = row.try_get(field.storage_name.as_str())?;
            out.insert(field.storage_name.clone(), StorageValue::Vector(value));
        }
    }

    Ok(out)
}

fn bind_keys<'q>(query: PgQuery<'q>, key_type: FieldType, keys: &[Value]) -> Result<PgQuery<'q>> {
    fn collect<T>(keys: &[Value], f: impl Fn(&Value) -> Option<T>) -> Result<Vec<T>> {
        keys.iter()
            .map(|key| {
                f(key).ok_or_else(|| {
                    LodestoneError::Mapping(
                        "key value does not match the declared key type".to_string(),
                    )
                })
            })
            .collect()
    }

    match key_type {
        FieldType::Int4 => Ok(query.bind(collect(keys, |k| match k {
            Value::Int4(v) => Some(*v),
            _ => None,
        })?)),
        FieldType::Int8 => Ok(query.bind(collect(keys, |k| match k {
            Value::Int8(v) => Some(*v),
            _ => None,
        })?)),
        FieldType::Uuid => Ok(query.bind(collect(keys, |k| match k {
            Value::Uuid(v) => Some(*v),
            _ => None,
        })?)),
        FieldType::Text => Ok(query.bind(collect(keys, |k| match k {
            Value::Text(v) => Some(v.clone()),
            _ => None,
        })?)),
        other => Err(LodestoneError::UnsupportedKeyType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::SearchFilter;
    use lodestone_core::{
        DataField, DistanceFunction, IndexKind, KeyField, RecordDefinition,
    };

    fn schema() -> RecordSchema {
        RecordSchema::describe(
            RecordDefinition::new()
                .key(KeyField::new("id", FieldType::Int4))
                .data(DataField::new("name", FieldType::Text).not_null())
                .data(DataField::new("tags", FieldType::TextArray))
                .vector(VectorField::new("embedding", 4)),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("hotels").is_ok());
        assert!(validate_identifier("hotel_rooms_2").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("bad name").is_err());
        assert!(validate_identifier("drop\";--").is_err());
    }

    #[test]
    fn test_create_table_sql() {
        let sql = build_create_table_sql("\"public\".\"hotels\"", &schema(), true);
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"public\".\"hotels\" (\
             \"id\" INTEGER PRIMARY KEY, \
             \"name\" TEXT NOT NULL, \
             \"tags\" TEXT[], \
             \"embedding\" VECTOR(4))"
        );
    }

    #[test]
    fn test_index_sql_per_kind() {
        let field = VectorField::new("embedding", 4)
            .with_distance(DistanceFunction::Euclidean)
            .with_index(IndexKind::IvfFlat);
        let sql = build_index_sql("\"public\".\"hotels\"", "hotels", &field).unwrap();
        assert_eq!(
            sql,
            "CREATE INDEX IF NOT EXISTS \"idx_hotels_embedding\" \
             ON \"public\".\"hotels\" USING ivfflat (\"embedding\" vector_l2_ops)"
        );

        let unindexed = VectorField::new("embedding", 4).with_index(IndexKind::None);
        assert!(build_index_sql("\"public\".\"hotels\"", "hotels", &unindexed).is_none());
    }

    #[test]
    fn test_upsert_sql() {
        let sql = build_upsert_sql("\"public\".\"hotels\"", &schema(), 2);
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"hotels\" (\"id\", \"name\", \"tags\", \"embedding\") \
             VALUES ($1, $2, $3, $4), ($5, $6, $7, $8) \
             ON CONFLICT (\"id\") DO UPDATE SET \
             \"name\" = EXCLUDED.\"name\", \
             \"tags\" = EXCLUDED.\"tags\", \
             \"embedding\" = EXCLUDED.\"embedding\""
        );
    }

    #[test]
    fn test_upsert_sql_key_only() {
        let key_only = RecordSchema::describe(
            RecordDefinition::new().key(KeyField::new("id", FieldType::Int8)),
        )
        .unwrap();

        let sql = build_upsert_sql("\"public\".\"t\"", &key_only, 1);
        assert!(sql.ends_with("ON CONFLICT (\"id\") DO NOTHING"));
    }

    #[test]
    fn test_search_sql_plain() {
        let schema = schema();
        let field = schema.vector_field("embedding").unwrap();
        let options = SearchOptions::default();

        let (sql, binds) =
            build_search_sql("\"public\".\"hotels\"", &schema, field, &options).unwrap();

        assert!(binds.is_empty());
        assert_eq!(
            sql,
            "SELECT \"id\", \"name\", \"tags\", \
             (\"embedding\" <=> $1::vector) AS _score \
             FROM \"public\".\"hotels\" \
             ORDER BY \"embedding\" <=> $1::vector LIMIT $2"
        );
    }

    #[test]
    fn test_search_sql_with_filter_and_vectors() {
        let schema = schema();
        let field = schema.vector_field("embedding").unwrap();
        let options = SearchOptions {
            include_vectors: true,
            filter: Some(
                SearchFilter::new()
                    .equal("name", "Grand")
                    .any_tag_equal("tags", "spa"),
            ),
            ..Default::default()
        };

        let (sql, binds) =
            build_search_sql("\"public\".\"hotels\"", &schema, field, &options).unwrap();

        assert_eq!(binds.len(), 2);
        assert_eq!(binds[0].0, FieldType::Text);
        assert_eq!(binds[1].0, FieldType::Text);
        assert!(sql.contains("WHERE \"name\" = $2 AND $3 = ANY(\"tags\")"));
        assert!(sql.contains("\"embedding\""));
        assert!(sql.ends_with("LIMIT $4"));
    }

    #[test]
    fn test_search_sql_rejects_unknown_filter_field() {
        let schema = schema();
        let field = schema.vector_field("embedding").unwrap();
        let options = SearchOptions {
            filter: Some(SearchFilter::new().equal("no_such_field", 1i32)),
            ..Default::default()
        };

        let err =
            build_search_sql("\"public\".\"hotels\"", &schema, field, &options).unwrap_err();
        assert!(matches!(err, LodestoneError::Schema(_)));
    }

    #[test]
    fn test_search_sql_rejects_tag_filter_on_scalar() {
        let schema = schema();
        let field = schema.vector_field("embedding").unwrap();
        let options = SearchOptions {
            filter: Some(SearchFilter::new().any_tag_equal("name", "x")),
            ..Default::default()
        };

        let err =
            build_search_sql("\"public\".\"hotels\"", &schema, field, &options).unwrap_err();
        assert!(matches!(err, LodestoneError::Schema(_)));
    }
}
