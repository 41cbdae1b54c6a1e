//! Lodestone PG - PostgreSQL + pgvector vector store
//!
//! Stores and searches vector embeddings (plus associated metadata) in
//! Postgres tables, one table per collection. Record⇄row translation is
//! schema-driven and lives entirely in the [`mapper`]; the collection layer
//! only orchestrates.

use async_trait::async_trait;
use futures::stream::BoxStream;
use lodestone_core::{RecordSchema, Result, Value, VectorField};

pub mod collection;
pub mod mapper;
pub mod pg_client;
pub mod row;
pub mod store;

pub use collection::{
    FilterClause, PgCollection, SearchFilter, SearchHit, SearchOptions, TypedCollection,
};
pub use mapper::RecordMapper;
pub use pg_client::{PgVectorClient, MAX_KEYS_PER_BATCH};
pub use row::{StorageRow, StorageValue};
pub use store::{CollectionFactory, PgStoreOptions, PgVectorStore, SUPPORTED_KEY_TYPES};

/// Trait for the low-level database operations a collection is built on
///
/// Implemented by [`PgVectorClient`] over a shared connection pool; test
/// doubles can implement it to exercise the layers above without a server.
#[async_trait]
pub trait VectorStoreDbClient: Send + Sync {
    /// Stream the table names in the target schema
    ///
    /// Lazy and one-shot: each call re-executes the catalog query, and the
    /// stream is safe to drop partially consumed.
    fn get_tables(&self) -> BoxStream<'_, Result<String>>;

    /// Whether a table exists in the target schema
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Create a table (and vector indexes) for the given record schema
    async fn create_table(
        &self,
        table: &str,
        schema: &RecordSchema,
        if_not_exists: bool,
    ) -> Result<()>;

    /// Drop a table
    async fn drop_table(&self, table: &str) -> Result<()>;

    /// Fetch rows by key
    async fn get_rows(
        &self,
        table: &str,
        schema: &RecordSchema,
        keys: &[Value],
        include_vectors: bool,
    ) -> Result<Vec<row::StorageRow>>;

    /// Insert or update rows, keyed on the schema's key column
    async fn upsert_rows(
        &self,
        table: &str,
        schema: &RecordSchema,
        rows: Vec<row::StorageRow>,
    ) -> Result<()>;

    /// Delete rows by key
    async fn delete_rows(&self, table: &str, schema: &RecordSchema, keys: &[Value])
        -> Result<()>;

    /// Vector similarity search over one vector column
    ///
    /// Returns rows ordered closest-first together with the score converted
    /// per the field's distance function.
    async fn search(
        &self,
        table: &str,
        schema: &RecordSchema,
        vector_field: &VectorField,
        query: &[f32],
        options: &collection::SearchOptions,
    ) -> Result<Vec<(row::StorageRow, f64)>>;
}
