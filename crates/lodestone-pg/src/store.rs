//! Top-level vector store
//!
//! Enumerates the collections (tables) of one schema and hands out
//! schema-bound collection handles sharing a single connection pool.

use std::sync::Arc;

use futures::stream::BoxStream;
use lodestone_core::{
    FieldType, LodestoneError, PgSettings, RecordDefinition, RecordSchema, Result, StoreRecord,
    DEFAULT_DB_SCHEMA,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::collection::{PgCollection, TypedCollection};
use crate::pg_client::PgVectorClient;
use crate::VectorStoreDbClient;

/// Key types a collection can be created with
pub const SUPPORTED_KEY_TYPES: &[FieldType] = &[
    FieldType::Int4,
    FieldType::Int8,
    FieldType::Uuid,
    FieldType::Text,
];

/// Hook for constructing custom collection implementations
pub trait CollectionFactory: Send + Sync {
    fn create(
        &self,
        client: Arc<dyn VectorStoreDbClient>,
        name: &str,
        schema: Arc<RecordSchema>,
    ) -> Result<PgCollection>;
}

/// Options for a [`PgVectorStore`]
#[derive(Clone, Default)]
pub struct PgStoreOptions {
    /// Schema (namespace) collections live in; `public` when empty
    pub db_schema: Option<String>,
    /// Optional custom collection construction
    pub collection_factory: Option<Arc<dyn CollectionFactory>>,
}

/// A vector store over one Postgres schema
///
/// Collections created from one store share its connection pool; their
/// lifetime is independent of the store's.
pub struct PgVectorStore {
    client: Arc<dyn VectorStoreDbClient>,
    factory: Option<Arc<dyn CollectionFactory>>,
}

impl PgVectorStore {
    /// Create a store over an existing connection pool
    pub fn new(pool: PgPool, options: PgStoreOptions) -> Self {
        let db_schema = options
            .db_schema
            .clone()
            .unwrap_or_else(|| DEFAULT_DB_SCHEMA.to_string());
        Self {
            client: Arc::new(PgVectorClient::new(pool, db_schema)),
            factory: options.collection_factory,
        }
    }

    /// Create a store over a custom database client
    pub fn with_client(client: Arc<dyn VectorStoreDbClient>, options: PgStoreOptions) -> Self {
        Self {
            client,
            factory: options.collection_factory,
        }
    }

    /// Create a store by opening a pool from settings
    pub async fn from_settings(settings: &PgSettings) -> Result<Self> {
        let options = settings.connect_options()?;
        let pool = PgPoolOptions::new()
            .min_connections(settings.min_pool)
            .max_connections(settings.max_pool)
            .connect_with(options)
            .await?;

        Ok(Self::new(
            pool,
            PgStoreOptions {
                db_schema: Some(settings.db_schema.clone()),
                ..Default::default()
            },
        ))
    }

    /// Stream the names of existing collections (tables) in the schema
    ///
    /// One-shot and lazy: each call re-executes the catalog listing, and
    /// partial consumption is fine.
    pub fn list_collections(&self) -> BoxStream<'_, Result<String>> {
        self.client.get_tables()
    }

    /// Build a collection handle for a record definition
    ///
    /// Validates the definition (once, here) and that its key type is one of
    /// [`SUPPORTED_KEY_TYPES`]; fails with
    /// [`LodestoneError::UnsupportedKeyType`] otherwise. Does not touch the
    /// database.
    pub fn collection(
        &self,
        name: impl Into<String>,
        definition: RecordDefinition,
    ) -> Result<PgCollection> {
        let schema = Arc::new(RecordSchema::describe(definition)?);

        let key_type = schema.key().field_type;
        if !SUPPORTED_KEY_TYPES.contains(&key_type) {
            return Err(LodestoneError::UnsupportedKeyType(format!(
                "{key_type}; only integer, bigint, uuid, and text keys are supported"
            )));
        }

        let name = name.into();
        match &self.factory {
            Some(factory) => factory.create(self.client.clone(), &name, schema),
            None => Ok(PgCollection::new(self.client.clone(), name, schema)),
        }
    }

    /// Build a typed collection handle, taking the definition from the type
    pub fn typed_collection<R: StoreRecord>(
        &self,
        name: impl Into<String>,
    ) -> Result<TypedCollection<R>> {
        Ok(TypedCollection::new(
            self.collection(name, R::definition())?,
        ))
    }
}
