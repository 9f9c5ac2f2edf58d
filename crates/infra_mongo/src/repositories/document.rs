//! MongoDB repository implementation
//!
//! `MongoRepository<E>` serves any [`Entity`] from its declared collection.
//! Each operation resolves its execution target from the ambient
//! [`DbContext`] at call time, issues exactly one driver action (or none,
//! for the trivially empty cases) and returns the driver's answer.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bson::doc;
//! use infra_mongo::{DocumentRepository, MongoDbContext, MongoRepository};
//!
//! let context = Arc::new(MongoDbContext::new(client, "crm"));
//! let customers = MongoRepository::<Customer>::new(context)?;
//!
//! customers.insert_one(&customer).await?;
//! let gold = customers.filter_by(Some(doc! { "tier": "gold" })).await?;
//! ```

use async_trait::async_trait;
use bson::Document;
use mongodb::Collection;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, instrument};

use core_kernel::{
    fields, id_to_bson, validate_collection_name, Entity, PageRequest, SharedClock, SortSpec,
    SystemClock, UpdateBuilder, UpdateDiff,
};

use super::dispatch::{drain, issue, Target};
use super::DocumentRepository;
use crate::context::DbContext;
use crate::error::RepositoryError;

/// MongoDB-backed repository for entity type `E`
pub struct MongoRepository<E: Entity> {
    context: Arc<dyn DbContext>,
    clock: SharedClock,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> MongoRepository<E> {
    /// Creates a repository reading the system clock for update stamps
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `E::COLLECTION` is not a valid
    /// collection name
    pub fn new(context: Arc<dyn DbContext>) -> Result<Self, RepositoryError> {
        Self::with_clock(context, SystemClock::shared())
    }

    /// Creates a repository stamping updates from `clock`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `E::COLLECTION` is not a valid
    /// collection name
    pub fn with_clock(context: Arc<dyn DbContext>, clock: SharedClock) -> Result<Self, RepositoryError> {
        validate_collection_name(E::COLLECTION)?;

        Ok(Self {
            context,
            clock,
            _entity: PhantomData,
        })
    }

    /// Returns a handle to the backing collection
    pub fn collection(&self) -> Collection<E> {
        self.context.database().collection::<E>(E::COLLECTION)
    }

    pub fn collection_name(&self) -> &'static str {
        E::COLLECTION
    }

    fn projected_collection<P: Send + Sync>(&self) -> Collection<P> {
        self.context.database().collection::<P>(E::COLLECTION)
    }

    fn id_filter(id: &E::Id) -> Result<Document, RepositoryError> {
        let mut filter = Document::new();
        filter.insert(fields::ID, id_to_bson(id)?);
        Ok(filter)
    }

    /// Runs `operation` unless the context's cancellation token fires first
    async fn guarded<T, F>(&self, operation: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        let token = self.context.cancellation();
        if token.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(RepositoryError::Cancelled),
            result = operation => result,
        }
    }

    async fn target(&self) -> Result<Target, RepositoryError> {
        let target = Target::resolve(self.context.as_ref()).await?;
        debug!(
            collection = E::COLLECTION,
            transactional = target.is_transactional(),
            "Resolved execution target"
        );
        Ok(target)
    }

    async fn apply_update(&self, filter: Document, diff: UpdateDiff) -> Result<u64, RepositoryError> {
        let update = diff.into_document();
        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.collection();
            let result = issue!(
                target,
                collection.update_one(filter.clone(), update.clone()).upsert(false)
            )?;
            Ok(result.modified_count)
        })
        .await
    }
}

impl<E: Entity> Clone for MongoRepository<E> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            clock: Arc::clone(&self.clock),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> std::fmt::Debug for MongoRepository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoRepository")
            .field("collection", &E::COLLECTION)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<E: Entity> DocumentRepository<E> for MongoRepository<E> {
    #[instrument(skip(self, id), fields(collection = E::COLLECTION, id = %id))]
    async fn find_by_id(&self, id: &E::Id) -> Result<Option<E>, RepositoryError> {
        debug!("Finding document by id");
        let filter = Self::id_filter(id)?;

        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.collection();
            Ok(issue!(target, collection.find_one(filter.clone()))?)
        })
        .await
    }

    #[instrument(skip(self, filter), fields(collection = E::COLLECTION))]
    async fn find_one(&self, filter: Option<Document>) -> Result<Option<E>, RepositoryError> {
        debug!(?filter, "Finding first matching document");
        let filter = filter.unwrap_or_default();

        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.collection();
            Ok(issue!(target, collection.find_one(filter.clone()))?)
        })
        .await
    }

    #[instrument(skip(self, filter, projection), fields(collection = E::COLLECTION))]
    async fn find_one_projected<P>(
        &self,
        filter: Option<Document>,
        projection: Document,
    ) -> Result<Option<P>, RepositoryError>
    where
        P: DeserializeOwned + Send + Sync + Unpin + 'static,
    {
        debug!(?filter, ?projection, "Finding first matching document with projection");
        let filter = filter.unwrap_or_default();

        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.projected_collection::<P>();
            Ok(issue!(
                target,
                collection
                    .find_one(filter.clone())
                    .projection(projection.clone())
            )?)
        })
        .await
    }

    #[instrument(skip(self, filter), fields(collection = E::COLLECTION))]
    async fn filter_by(&self, filter: Option<Document>) -> Result<Vec<E>, RepositoryError> {
        debug!(?filter, "Filtering documents");
        let filter = filter.unwrap_or_default();

        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.collection();
            Ok(drain!(target, collection.find(filter.clone()))?)
        })
        .await
    }

    #[instrument(skip(self, filter, projection), fields(collection = E::COLLECTION))]
    async fn filter_by_projected<P>(
        &self,
        filter: Option<Document>,
        projection: Document,
    ) -> Result<Vec<P>, RepositoryError>
    where
        P: DeserializeOwned + Send + Sync + Unpin + 'static,
    {
        debug!(?filter, ?projection, "Filtering documents with projection");
        let filter = filter.unwrap_or_default();

        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.projected_collection::<P>();
            Ok(drain!(
                target,
                collection
                    .find(filter.clone())
                    .projection(projection.clone())
            )?)
        })
        .await
    }

    #[instrument(skip(self, filter), fields(collection = E::COLLECTION))]
    async fn count(&self, filter: Option<Document>) -> Result<u64, RepositoryError> {
        debug!(?filter, "Counting documents");
        let filter = filter.unwrap_or_default();

        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.collection();
            Ok(issue!(target, collection.count_documents(filter.clone()))?)
        })
        .await
    }

    #[instrument(
        skip(self, filter, sort),
        fields(collection = E::COLLECTION, sort = %sort, offset = page.offset, page_size = page.page_size)
    )]
    async fn paginate(
        &self,
        filter: Option<Document>,
        sort: &SortSpec,
        page: PageRequest,
    ) -> Result<Vec<E>, RepositoryError> {
        // A driver limit of 0 means "no limit", so an empty page never reaches it
        if page.page_size == 0 {
            return Ok(Vec::new());
        }
        debug!(?filter, "Paginating documents");
        let filter = filter.unwrap_or_default();
        let sort = sort.to_document();

        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.collection();
            Ok(drain!(
                target,
                collection
                    .find(filter.clone())
                    .sort(sort.clone())
                    .skip(page.offset)
                    .limit(i64::from(page.page_size))
            )?)
        })
        .await
    }

    #[instrument(
        skip(self, filter, projection, sort),
        fields(collection = E::COLLECTION, sort = %sort, offset = page.offset, page_size = page.page_size)
    )]
    async fn paginate_projected<P>(
        &self,
        filter: Option<Document>,
        projection: Document,
        sort: &SortSpec,
        page: PageRequest,
    ) -> Result<Vec<P>, RepositoryError>
    where
        P: DeserializeOwned + Send + Sync + Unpin + 'static,
    {
        if page.page_size == 0 {
            return Ok(Vec::new());
        }
        debug!(?filter, ?projection, "Paginating documents with projection");
        let filter = filter.unwrap_or_default();
        let sort = sort.to_document();

        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.projected_collection::<P>();
            Ok(drain!(
                target,
                collection
                    .find(filter.clone())
                    .projection(projection.clone())
                    .sort(sort.clone())
                    .skip(page.offset)
                    .limit(i64::from(page.page_size))
            )?)
        })
        .await
    }

    #[instrument(skip(self, pipeline), fields(collection = E::COLLECTION, stages = pipeline.len()))]
    async fn aggregate<R>(&self, pipeline: Vec<Document>) -> Result<Vec<R>, RepositoryError>
    where
        R: DeserializeOwned + Send + 'static,
    {
        debug!("Running aggregation pipeline");

        let documents: Vec<Document> = self
            .guarded(async {
                let mut target = self.target().await?;
                let collection = self.collection();
                Ok(drain!(target, collection.aggregate(pipeline.clone()))?)
            })
            .await?;

        documents
            .into_iter()
            .map(|document| bson::from_document::<R>(document).map_err(RepositoryError::from))
            .collect()
    }

    #[instrument(skip(self, entity), fields(collection = E::COLLECTION, id = %entity.id()))]
    async fn insert_one(&self, entity: &E) -> Result<(), RepositoryError> {
        debug!("Inserting document");

        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.collection();
            issue!(target, collection.insert_one(entity))?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, entities), fields(collection = E::COLLECTION, count = entities.len()))]
    async fn insert_many(&self, entities: &[E]) -> Result<(), RepositoryError> {
        // The driver rejects an empty batch
        if entities.is_empty() {
            debug!("Nothing to insert");
            return Ok(());
        }
        debug!("Inserting documents");

        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.collection();
            issue!(target, collection.insert_many(entities))?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, id), fields(collection = E::COLLECTION, id = %id))]
    async fn delete_by_id(&self, id: &E::Id) -> Result<Option<E>, RepositoryError> {
        debug!("Deleting document by id");
        let filter = Self::id_filter(id)?;

        self.guarded(async {
            let mut target = self.target().await?;
            let collection = self.collection();
            Ok(issue!(target, collection.find_one_and_delete(filter.clone()))?)
        })
        .await
    }

    #[instrument(skip(self, entity), fields(collection = E::COLLECTION, id = %entity.id()))]
    async fn update_one(&self, entity: &E) -> Result<u64, RepositoryError> {
        let filter = Self::id_filter(entity.id())?;
        let diff = UpdateDiff::from_entity(entity, self.clock.now())?;
        debug!(fields = diff.len(), "Updating document");

        self.apply_update(filter, diff).await
    }

    #[instrument(skip(self, id, update), fields(collection = E::COLLECTION, id = %id))]
    async fn update_fields(
        &self,
        id: &E::Id,
        update: UpdateBuilder<E>,
    ) -> Result<u64, RepositoryError> {
        let filter = Self::id_filter(id)?;
        let diff = update.build(self.clock.now())?;
        debug!(fields = diff.len(), "Updating document fields");

        self.apply_update(filter, diff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::DateTime as BsonDateTime;
    use mongodb::{Client, Database};
    use serde::{Deserialize, Serialize};
    use tokio_util::sync::CancellationToken;

    use crate::context::SharedSession;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Ticket {
        #[serde(rename = "_id")]
        id: String,
        subject: String,
        created_at: BsonDateTime,
        created_by: Option<String>,
        modified_at: Option<BsonDateTime>,
    }

    impl Entity for Ticket {
        type Id = String;
        const COLLECTION: &'static str = "tickets";

        fn id(&self) -> &String {
            &self.id
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Misdeclared {
        #[serde(rename = "_id")]
        id: String,
    }

    impl Entity for Misdeclared {
        type Id = String;
        const COLLECTION: &'static str = "price$history";

        fn id(&self) -> &String {
            &self.id
        }
    }

    /// Context whose transaction flag and session can be set independently
    struct StubContext {
        database: Database,
        active: bool,
        session: Option<SharedSession>,
        token: CancellationToken,
    }

    impl DbContext for StubContext {
        fn database(&self) -> &Database {
            &self.database
        }

        fn has_active_transaction(&self) -> bool {
            self.active
        }

        fn current_session(&self) -> Option<SharedSession> {
            self.session.clone()
        }

        fn cancellation(&self) -> CancellationToken {
            self.token.clone()
        }
    }

    async fn stub_context(active: bool) -> StubContext {
        // Lazily connecting client; these tests never reach a server.
        let client = Client::with_uri_str("mongodb://127.0.0.1:1")
            .await
            .expect("valid connection string");
        StubContext {
            database: client.database("repository_tests"),
            active,
            session: None,
            token: CancellationToken::new(),
        }
    }

    fn ticket() -> Ticket {
        Ticket {
            id: "T-1".to_string(),
            subject: "printer on fire".to_string(),
            created_at: BsonDateTime::from_millis(0),
            created_by: None,
            modified_at: None,
        }
    }

    #[tokio::test]
    async fn test_invalid_collection_declaration_fails_at_construction() {
        let context: Arc<dyn DbContext> = Arc::new(stub_context(false).await);

        let result = MongoRepository::<Misdeclared>::new(context);
        match result {
            Err(error) => assert!(error.is_configuration_error()),
            Ok(_) => panic!("Expected a configuration error"),
        }
    }

    #[tokio::test]
    async fn test_collection_handle_uses_declared_name() {
        let context: Arc<dyn DbContext> = Arc::new(stub_context(false).await);
        let repository = MongoRepository::<Ticket>::new(context).unwrap();

        assert_eq!(repository.collection_name(), "tickets");
        assert_eq!(repository.collection().name(), "tickets");
    }

    #[tokio::test]
    async fn test_active_transaction_without_session_is_reported() {
        let context: Arc<dyn DbContext> = Arc::new(stub_context(true).await);
        let repository = MongoRepository::<Ticket>::new(context).unwrap();

        let result = repository.find_by_id(&"T-1".to_string()).await;
        assert!(matches!(result, Err(RepositoryError::SessionUnavailable)));

        let result = repository.count(None).await;
        assert!(matches!(result, Err(RepositoryError::SessionUnavailable)));
    }

    #[tokio::test]
    async fn test_writes_queued_behind_a_finished_transaction_are_refused() {
        // Commit and abort leave the shared slot empty for anyone still queued.
        let mut context = stub_context(true).await;
        context.session = Some(Arc::new(tokio::sync::Mutex::new(None)));
        let repository = MongoRepository::<Ticket>::new(Arc::new(context)).unwrap();

        assert!(matches!(
            repository.insert_one(&ticket()).await,
            Err(RepositoryError::SessionUnavailable)
        ));
        assert!(matches!(
            repository.update_one(&ticket()).await,
            Err(RepositoryError::SessionUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits_every_operation() {
        let context = stub_context(false).await;
        context.token.cancel();
        let repository = MongoRepository::<Ticket>::new(Arc::new(context)).unwrap();

        assert!(matches!(
            repository.filter_by(None).await,
            Err(RepositoryError::Cancelled)
        ));
        assert!(matches!(
            repository.insert_one(&ticket()).await,
            Err(RepositoryError::Cancelled)
        ));
        assert!(matches!(
            repository.update_one(&ticket()).await,
            Err(RepositoryError::Cancelled)
        ));
        assert!(matches!(
            repository.aggregate::<Document>(Vec::new()).await,
            Err(RepositoryError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_zero_page_size_returns_empty_page() {
        let context: Arc<dyn DbContext> = Arc::new(stub_context(false).await);
        let repository = MongoRepository::<Ticket>::new(context).unwrap();

        let page = repository
            .paginate(None, &SortSpec::new().ascending("subject"), PageRequest::new(0, 0))
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_empty_insert_many_is_a_no_op() {
        let context: Arc<dyn DbContext> = Arc::new(stub_context(false).await);
        let repository = MongoRepository::<Ticket>::new(context).unwrap();

        assert!(repository.insert_many(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_fields_rejects_immutable_field_before_any_call() {
        let context: Arc<dyn DbContext> = Arc::new(stub_context(false).await);
        let repository = MongoRepository::<Ticket>::new(context).unwrap();

        let update = UpdateDiff::builder::<Ticket>().set("createdAt", BsonDateTime::now());
        let result = repository.update_fields(&"T-1".to_string(), update).await;

        assert!(matches!(
            result,
            Err(RepositoryError::Core(core_kernel::CoreError::ImmutableField(_)))
        ));
    }
}
