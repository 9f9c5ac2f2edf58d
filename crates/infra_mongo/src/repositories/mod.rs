//! Document repositories
//!
//! This module provides the generic repository contract for entity
//! collections and its MongoDB implementation.
//!
//! # Architecture
//!
//! Each repository follows these principles:
//! - One collection per entity type, named by `Entity::COLLECTION`
//! - Every call honours the ambient transaction of its `DbContext`
//! - Partial updates only; identifier and creation-audit fields are never written
//! - Driver errors pass through unchanged; "not found" is an empty result

pub(crate) mod dispatch;
pub mod document;

pub use document::MongoRepository;

use async_trait::async_trait;
use bson::Document;
use serde::de::DeserializeOwned;

use core_kernel::{Entity, PageRequest, SortSpec, UpdateBuilder};

use crate::error::RepositoryError;

/// Trait for document repository operations
///
/// Filters and projections are driver-level query documents. A `None`
/// filter matches every document in the collection.
///
/// # Type Parameters
///
/// * `E` - The entity type stored in the collection
#[async_trait]
pub trait DocumentRepository<E: Entity>: Send + Sync {
    /// Retrieves the entity with the given identifier
    ///
    /// # Returns
    ///
    /// The entity, or `None` if no document has that identifier
    async fn find_by_id(&self, id: &E::Id) -> Result<Option<E>, RepositoryError>;

    /// Retrieves the first entity matching `filter`
    async fn find_one(&self, filter: Option<Document>) -> Result<Option<E>, RepositoryError>;

    /// Retrieves the first match reshaped by `projection`
    async fn find_one_projected<P>(
        &self,
        filter: Option<Document>,
        projection: Document,
    ) -> Result<Option<P>, RepositoryError>
    where
        P: DeserializeOwned + Send + Sync + Unpin + 'static;

    /// Retrieves every entity matching `filter`
    async fn filter_by(&self, filter: Option<Document>) -> Result<Vec<E>, RepositoryError>;

    /// Retrieves every match reshaped by `projection`
    async fn filter_by_projected<P>(
        &self,
        filter: Option<Document>,
        projection: Document,
    ) -> Result<Vec<P>, RepositoryError>
    where
        P: DeserializeOwned + Send + Sync + Unpin + 'static;

    /// Counts the entities matching `filter`
    async fn count(&self, filter: Option<Document>) -> Result<u64, RepositoryError>;

    /// Retrieves one sorted window of the entities matching `filter`
    ///
    /// # Arguments
    ///
    /// * `filter` - Query document, `None` for all documents
    /// * `sort` - Sort specification applied before skipping
    /// * `page` - Offset and page size of the window
    async fn paginate(
        &self,
        filter: Option<Document>,
        sort: &SortSpec,
        page: PageRequest,
    ) -> Result<Vec<E>, RepositoryError>;

    /// Retrieves one sorted window reshaped by `projection`
    async fn paginate_projected<P>(
        &self,
        filter: Option<Document>,
        projection: Document,
        sort: &SortSpec,
        page: PageRequest,
    ) -> Result<Vec<P>, RepositoryError>
    where
        P: DeserializeOwned + Send + Sync + Unpin + 'static;

    /// Runs an aggregation pipeline over the collection
    ///
    /// Each output document is deserialized into `R`.
    async fn aggregate<R>(&self, pipeline: Vec<Document>) -> Result<Vec<R>, RepositoryError>
    where
        R: DeserializeOwned + Send + 'static;

    /// Inserts one entity; its identifier must already be set
    async fn insert_one(&self, entity: &E) -> Result<(), RepositoryError>;

    /// Inserts several entities; their identifiers must already be set
    async fn insert_many(&self, entities: &[E]) -> Result<(), RepositoryError>;

    /// Removes the entity with the given identifier
    ///
    /// # Returns
    ///
    /// The removed entity, or `None` if nothing matched (not an error)
    async fn delete_by_id(&self, id: &E::Id) -> Result<Option<E>, RepositoryError>;

    /// Applies the update diff of `entity` to its stored document
    ///
    /// Never upserts. Identifier and creation-audit fields are left untouched
    /// and the modification field is stamped with the current time.
    ///
    /// # Returns
    ///
    /// The number of documents modified (0 or 1)
    async fn update_one(&self, entity: &E) -> Result<u64, RepositoryError>;

    /// Applies an explicit list of field changes to the entity with `id`
    ///
    /// # Returns
    ///
    /// The number of documents modified (0 or 1)
    async fn update_fields(
        &self,
        id: &E::Id,
        update: UpdateBuilder<E>,
    ) -> Result<u64, RepositoryError>;
}
