//! Ambient database context
//!
//! A [`DbContext`] is the request-scoped collaborator a repository consults
//! on every call: it hands out the database handle, says whether a
//! transaction is active and, if so, exposes the session that the operation
//! must run in. Repositories only read the context; they never begin, commit
//! or abort a transaction themselves.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_mongo::{MongoDbContext, MongoRepository, DocumentRepository};
//!
//! let context = Arc::new(MongoDbContext::new(client, "crm"));
//! let customers = MongoRepository::<Customer>::new(context.clone())?;
//!
//! context.begin_transaction().await?;
//! customers.insert_one(&customer).await?;   // runs inside the transaction
//! context.commit_transaction().await?;
//! ```

use mongodb::{Client, ClientSession, Database};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::RepositoryError;

/// Session handle shared between a context and the operations using it
///
/// The driver needs `&mut ClientSession` for every call, so the session sits
/// behind an async mutex; concurrent operations on one session run one at a
/// time. Commit and abort take the session out from under the lock, so an
/// operation that acquires the lock afterwards finds `None` and must not run.
pub type SharedSession = Arc<tokio::sync::Mutex<Option<ClientSession>>>;

/// Request-scoped view of the database and its transaction state
pub trait DbContext: Send + Sync {
    /// Database holding the entity collections
    fn database(&self) -> &Database;

    /// Whether operations must currently run inside a transaction
    fn has_active_transaction(&self) -> bool;

    /// Session of the active transaction
    fn current_session(&self) -> Option<SharedSession>;

    /// Token that cancels every operation issued through this context
    fn cancellation(&self) -> CancellationToken {
        CancellationToken::new()
    }
}

/// Production [`DbContext`] backed by a MongoDB client
///
/// Owns at most one transaction at a time. Create one context per request
/// (or unit of work) so that transactions do not leak between callers.
#[derive(Debug)]
pub struct MongoDbContext {
    client: Client,
    database: Database,
    session: Mutex<Option<SharedSession>>,
    cancellation: CancellationToken,
}

impl MongoDbContext {
    /// Creates a context over `database_name` with no active transaction
    pub fn new(client: Client, database_name: &str) -> Self {
        let database = client.database(database_name);
        Self {
            client,
            database,
            session: Mutex::new(None),
            cancellation: CancellationToken::new(),
        }
    }

    /// Ties the context to a caller-owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Starts a session and a transaction on it
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::TransactionAlreadyActive` if one is running,
    /// or the driver error if the session or transaction cannot be started
    pub async fn begin_transaction(&self) -> Result<(), RepositoryError> {
        if self.has_active_transaction() {
            return Err(RepositoryError::TransactionAlreadyActive);
        }

        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        let mut slot = self.slot();
        if slot.is_some() {
            return Err(RepositoryError::TransactionAlreadyActive);
        }
        *slot = Some(Arc::new(tokio::sync::Mutex::new(Some(session))));

        info!(database = %self.database.name(), "Transaction started");
        Ok(())
    }

    /// Commits the active transaction and releases its session
    ///
    /// The context has no active transaction afterwards, whether or not the
    /// commit succeeded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NoActiveTransaction` if none is running, or
    /// the driver error if the commit fails
    pub async fn commit_transaction(&self) -> Result<(), RepositoryError> {
        let mut session = self.take_session().await?;
        session.commit_transaction().await?;

        info!(database = %self.database.name(), "Transaction committed");
        Ok(())
    }

    /// Aborts the active transaction and releases its session
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NoActiveTransaction` if none is running, or
    /// the driver error if the abort fails
    pub async fn abort_transaction(&self) -> Result<(), RepositoryError> {
        let mut session = self.take_session().await?;
        session.abort_transaction().await?;

        info!(database = %self.database.name(), "Transaction aborted");
        Ok(())
    }

    /// Detaches the session from the context and from every pending operation
    ///
    /// Operations already holding the lock finish inside the transaction;
    /// operations queued behind it find the slot emptied.
    async fn take_session(&self) -> Result<ClientSession, RepositoryError> {
        let shared = self.slot().take().ok_or(RepositoryError::NoActiveTransaction)?;
        let mut guard = shared.lock().await;
        guard.take().ok_or(RepositoryError::NoActiveTransaction)
    }

    fn slot(&self) -> MutexGuard<'_, Option<SharedSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DbContext for MongoDbContext {
    fn database(&self) -> &Database {
        &self.database
    }

    fn has_active_transaction(&self) -> bool {
        self.slot().is_some()
    }

    fn current_session(&self) -> Option<SharedSession> {
        self.slot().clone()
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}
