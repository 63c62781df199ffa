//! MongoDB connection and typed collections
//!
//! Every document carries `Metadata`. Reads skip soft-deleted documents and
//! writes stamp `updated_at`, so `store::mongo` only deals in game filters.

use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::{
    options::{IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::db::schemas::Metadata;
use crate::types::StarlightError;

/// Fail fast instead of hanging when the server is unreachable
const SELECTION_TIMEOUT_MS: u32 = 3000;

/// Indexes a schema wants on its collection
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Access to a schema's `Metadata`
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Bounds shared by every game document
pub trait GameDocument:
    Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata
{
}

impl<T> GameDocument for T where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata
{
}

fn with_selection_timeout(uri: &str) -> String {
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!(
        "{}{}serverSelectionTimeoutMS={ms}&connectTimeoutMS={ms}",
        uri,
        separator,
        ms = SELECTION_TIMEOUT_MS
    )
}

/// Restrict `filter` to documents that are not soft-deleted
fn live(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

fn db_error(action: &str) -> impl Fn(mongodb::error::Error) -> StarlightError + '_ {
    move |e| StarlightError::Database(format!("{} failed: {}", action, e))
}

/// Connected game database
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping, so an unreachable server surfaces at startup
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, StarlightError> {
        info!("Connecting to MongoDB at {}", uri);

        let client = Client::with_uri_str(with_selection_timeout(uri))
            .await
            .map_err(db_error("MongoDB connect"))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(db_error("MongoDB ping"))?;

        info!("Connected to MongoDB database '{}'", db_name);
        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Open a collection, creating the schema's indexes first
    pub async fn collection<T: GameDocument>(&self, name: &str) -> Result<MongoCollection<T>, StarlightError> {
        let inner = self.client.database(&self.db_name).collection::<T>(name);

        let indexes: Vec<IndexModel> = T::into_indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();
        if !indexes.is_empty() {
            debug!("Ensuring {} indexes on '{}'", indexes.len(), name);
            inner
                .create_indexes(indexes)
                .await
                .map_err(db_error("Index creation"))?;
        }

        Ok(MongoCollection { inner })
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed collection of game documents
#[derive(Debug, Clone)]
pub struct MongoCollection<T: GameDocument> {
    inner: Collection<T>,
}

impl<T: GameDocument> MongoCollection<T> {
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, StarlightError> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(now);
        metadata.updated_at = Some(now);

        self.inner
            .insert_one(item)
            .await
            .map_err(db_error("Insert"))?
            .inserted_id
            .as_object_id()
            .ok_or_else(|| StarlightError::Database("Inserted id is not an ObjectId".into()))
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, StarlightError> {
        self.inner.find_one(live(filter)).await.map_err(db_error("Find"))
    }

    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> Result<Vec<T>, StarlightError> {
        let mut find = self.inner.find(live(filter));
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        if let Some(limit) = limit {
            find = find.limit(limit);
        }

        find.await
            .map_err(db_error("Find"))?
            .try_collect::<Vec<T>>()
            .await
            .map_err(db_error("Cursor read"))
    }

    /// Replace the document matching `filter`. Returns the matched count,
    /// zero when an expected revision in the filter has moved on.
    pub async fn replace_one(&self, filter: Document, mut item: T) -> Result<u64, StarlightError> {
        item.mut_metadata().updated_at = Some(DateTime::now());

        let result = self
            .inner
            .replace_one(filter, item)
            .await
            .map_err(db_error("Replace"))?;
        Ok(result.matched_count)
    }

    pub async fn update_many(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, StarlightError> {
        self.inner
            .update_many(filter, update.into())
            .await
            .map_err(db_error("Update"))
    }
}
