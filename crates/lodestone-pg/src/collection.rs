//! Schema-bound collection over one table
//!
//! A [`PgCollection`] is a named handle supporting CRUD and vector search.
//! Every record⇄row translation goes through the [`RecordMapper`]; the
//! collection itself holds no mapping logic. [`TypedCollection`] adapts the
//! same operations to a strongly typed record.

use std::marker::PhantomData;
use std::sync::Arc;

use lodestone_core::{GenericRecord, LodestoneError, RecordSchema, Result, StoreRecord, Value};
use tracing::debug;

use crate::mapper::RecordMapper;
use crate::VectorStoreDbClient;

// ============================================================================
// Search Options
// ============================================================================

/// A single filter predicate
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    /// The data field equals the value
    Equal { field: String, value: Value },
    /// The list-typed data field contains the value as an element
    AnyTagEqual { field: String, value: Value },
}

/// Conjunction of filter clauses applied to a search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub clauses: Vec<FilterClause>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equal(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(FilterClause::Equal {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn any_tag_equal(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(FilterClause::AnyTagEqual {
            field: field.into(),
            value: value.into(),
        });
        self
    }
}

/// Options for a vector similarity search
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of hits returned
    pub limit: usize,
    /// Whether vector columns are fetched and mapped back
    pub include_vectors: bool,
    /// Optional filter predicate, ANDed clause by clause
    pub filter: Option<SearchFilter>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 3,
            include_vectors: false,
            filter: None,
        }
    }
}

/// One search result: the mapped record plus its score
///
/// The score is already converted per the vector field's distance function;
/// hits arrive ordered closest-first.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record: GenericRecord,
    pub score: f64,
}

// ============================================================================
// Collection
// ============================================================================

/// A collection of records stored in one Postgres table
pub struct PgCollection {
    client: Arc<dyn VectorStoreDbClient>,
    name: String,
    schema: Arc<RecordSchema>,
    mapper: RecordMapper,
}

impl std::fmt::Debug for PgCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgCollection")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl PgCollection {
    pub fn new(
        client: Arc<dyn VectorStoreDbClient>,
        name: impl Into<String>,
        schema: Arc<RecordSchema>,
    ) -> Self {
        Self {
            client,
            name: name.into(),
            mapper: RecordMapper::new(schema.clone()),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Whether the backing table exists
    pub async fn exists(&self) -> Result<bool> {
        self.client.table_exists(&self.name).await
    }

    /// Create the backing table and its vector indexes
    pub async fn create(&self) -> Result<()> {
        self.client.create_table(&self.name, &self.schema, false).await
    }

    /// Create the backing table when it does not exist yet
    pub async fn create_if_missing(&self) -> Result<()> {
        self.client.create_table(&self.name, &self.schema, true).await
    }

    /// Drop the backing table
    pub async fn delete_collection(&self) -> Result<()> {
        self.client.drop_table(&self.name).await
    }

    /// Fetch a single record by key
    pub async fn get(
        &self,
        key: impl Into<Value>,
        include_vectors: bool,
    ) -> Result<Option<GenericRecord>> {
        let keys = [key.into()];
        let rows = self
            .client
            .get_rows(&self.name, &self.schema, &keys, include_vectors)
            .await?;

        rows.first()
            .map(|row| self.mapper.from_storage(row, include_vectors))
            .transpose()
    }

    /// Fetch multiple records by key
    ///
    /// Keys with no matching row are absent from the result; the order of
    /// returned records is not guaranteed to match the key order.
    pub async fn get_batch(
        &self,
        keys: &[Value],
        include_vectors: bool,
    ) -> Result<Vec<GenericRecord>> {
        let rows = self
            .client
            .get_rows(&self.name, &self.schema, keys, include_vectors)
            .await?;

        rows.iter()
            .map(|row| self.mapper.from_storage(row, include_vectors))
            .collect()
    }

    /// Insert or update a single record, returning its key
    pub async fn upsert(&self, record: &GenericRecord) -> Result<Value> {
        let row = self.mapper.to_storage(record);
        self.client
            .upsert_rows(&self.name, &self.schema, vec![row])
            .await?;
        Ok(record.key.clone())
    }

    /// Insert or update multiple records, returning their keys
    ///
    /// All records are mapped before any I/O, so a mapping problem fails the
    /// call before anything is written.
    pub async fn upsert_batch(&self, records: &[GenericRecord]) -> Result<Vec<Value>> {
        let rows = records.iter().map(|r| self.mapper.to_storage(r)).collect();
        self.client
            .upsert_rows(&self.name, &self.schema, rows)
            .await?;

        debug!(collection = %self.name, count = records.len(), "upserted records");
        Ok(records.iter().map(|r| r.key.clone()).collect())
    }

    /// Delete a single record by key
    pub async fn delete(&self, key: impl Into<Value>) -> Result<()> {
        let keys = [key.into()];
        self.client.delete_rows(&self.name, &self.schema, &keys).await
    }

    /// Delete multiple records by key
    pub async fn delete_batch(&self, keys: &[Value]) -> Result<()> {
        self.client.delete_rows(&self.name, &self.schema, keys).await
    }

    /// Vector similarity search over one declared vector field
    ///
    /// Hits are ordered closest-first per the field's distance function.
    pub async fn search(
        &self,
        vector_field: &str,
        query: &[f32],
        options: SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        let field = self.schema.vector_field(vector_field).ok_or_else(|| {
            LodestoneError::Schema(format!("unknown vector field '{vector_field}'"))
        })?;

        let hits = self
            .client
            .search(&self.name, &self.schema, field, query, &options)
            .await?;

        hits.iter()
            .map(|(row, score)| {
                Ok(SearchHit {
                    record: self.mapper.from_storage(row, options.include_vectors)?,
                    score: *score,
                })
            })
            .collect()
    }
}

// ============================================================================
// Typed Collection
// ============================================================================

/// Strongly typed adapter over [`PgCollection`]
///
/// Converts through [`StoreRecord`] at the boundary; all storage behavior is
/// the inner collection's.
pub struct TypedCollection<R: StoreRecord> {
    inner: PgCollection,
    _record: PhantomData<fn() -> R>,
}

impl<R: StoreRecord> TypedCollection<R> {
    pub fn new(inner: PgCollection) -> Self {
        Self {
            inner,
            _record: PhantomData,
        }
    }

    /// The untyped collection this adapter wraps
    pub fn inner(&self) -> &PgCollection {
        &self.inner
    }

    pub async fn exists(&self) -> Result<bool> {
        self.inner.exists().await
    }

    pub async fn create(&self) -> Result<()> {
        self.inner.create().await
    }

    pub async fn create_if_missing(&self) -> Result<()> {
        self.inner.create_if_missing().await
    }

    pub async fn delete_collection(&self) -> Result<()> {
        self.inner.delete_collection().await
    }

    pub async fn get(&self, key: impl Into<Value>, include_vectors: bool) -> Result<Option<R>> {
        self.inner
            .get(key, include_vectors)
            .await?
            .map(R::from_record)
            .transpose()
    }

    pub async fn get_batch(&self, keys: &[Value], include_vectors: bool) -> Result<Vec<R>> {
        self.inner
            .get_batch(keys, include_vectors)
            .await?
            .into_iter()
            .map(R::from_record)
            .collect()
    }

    pub async fn upsert(&self, record: R) -> Result<Value> {
        self.inner.upsert(&record.into_record()).await
    }

    pub async fn upsert_batch(&self, records: Vec<R>) -> Result<Vec<Value>> {
        let records: Vec<GenericRecord> =
            records.into_iter().map(StoreRecord::into_record).collect();
        self.inner.upsert_batch(&records).await
    }

    pub async fn delete(&self, key: impl Into<Value>) -> Result<()> {
        self.inner.delete(key).await
    }

    pub async fn delete_batch(&self, keys: &[Value]) -> Result<()> {
        self.inner.delete_batch(keys).await
    }

    pub async fn search(
        &self,
        vector_field: &str,
        query: &[f32],
        options: SearchOptions,
    ) -> Result<Vec<(R, f64)>> {
        self.inner
            .search(vector_field, query, options)
            .await?
            .into_iter()
            .map(|hit| Ok((R::from_record(hit.record)?, hit.score)))
            .collect()
    }
}
