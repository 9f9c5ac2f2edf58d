//! Execution target resolution
//!
//! Every repository operation runs either as a standalone driver call or
//! inside the ambient transaction's session. `Target::resolve` makes that
//! decision once per call, and the `issue!` / `drain!` macros apply a
//! driver action to whichever target was resolved, so operations themselves
//! contain a single call path.

use mongodb::ClientSession;
use tokio::sync::OwnedMutexGuard;

use crate::context::DbContext;
use crate::error::RepositoryError;

/// Where a driver action is issued
pub(crate) enum Target {
    /// Plain call outside any transaction
    Standalone,
    /// Call bound to the active transaction's session, held for the whole call
    ///
    /// The slot is always `Some`; `resolve` never builds this variant otherwise.
    Session(OwnedMutexGuard<Option<ClientSession>>),
}

impl Target {
    /// Reads the context's transaction state and picks the target
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::SessionUnavailable` if the context reports
    /// an active transaction without a session, or if the transaction was
    /// committed or aborted while this call waited for the session
    pub(crate) async fn resolve(context: &dyn DbContext) -> Result<Self, RepositoryError> {
        if !context.has_active_transaction() {
            return Ok(Target::Standalone);
        }

        let Some(shared) = context.current_session() else {
            // Ended between the two reads: the call belongs after it.
            if !context.has_active_transaction() {
                return Ok(Target::Standalone);
            }
            return Err(RepositoryError::SessionUnavailable);
        };

        let guard = shared.lock_owned().await;
        if guard.is_none() {
            return Err(RepositoryError::SessionUnavailable);
        }
        Ok(Target::Session(guard))
    }

    pub(crate) fn session(&mut self) -> Option<&mut ClientSession> {
        match self {
            Target::Standalone => None,
            Target::Session(guard) => guard.as_mut(),
        }
    }

    pub(crate) fn is_transactional(&self) -> bool {
        matches!(self, Target::Session(_))
    }
}

/// Awaits a single-result driver action on the resolved target
macro_rules! issue {
    ($target:expr, $action:expr) => {
        match $target.session() {
            Some(session) => $action.session(session).await,
            None => $action.await,
        }
    };
}

/// Awaits a cursor-returning driver action and collects every document
macro_rules! drain {
    ($target:expr, $action:expr) => {
        match $target.session() {
            Some(session) => {
                let mut cursor = $action.session(&mut *session).await?;
                ::futures_util::TryStreamExt::try_collect::<Vec<_>>(cursor.stream(session)).await
            }
            None => {
                let cursor = $action.await?;
                ::futures_util::TryStreamExt::try_collect::<Vec<_>>(cursor).await
            }
        }
    };
}

pub(crate) use drain;
pub(crate) use issue;

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::{Client, Database};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::context::SharedSession;

    /// Context whose transaction ends right after the flag was read
    struct EndingContext {
        database: Database,
        active: AtomicBool,
    }

    impl DbContext for EndingContext {
        fn database(&self) -> &Database {
            &self.database
        }

        fn has_active_transaction(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        fn current_session(&self) -> Option<SharedSession> {
            self.active.store(false, Ordering::SeqCst);
            None
        }
    }

    /// Context still reporting a transaction whose session was taken
    struct DetachedContext {
        database: Database,
        session: SharedSession,
    }

    impl DbContext for DetachedContext {
        fn database(&self) -> &Database {
            &self.database
        }

        fn has_active_transaction(&self) -> bool {
            true
        }

        fn current_session(&self) -> Option<SharedSession> {
            Some(Arc::clone(&self.session))
        }
    }

    async fn offline_database() -> Database {
        let client = Client::with_uri_str("mongodb://127.0.0.1:1")
            .await
            .expect("valid connection string");
        client.database("dispatch_tests")
    }

    #[tokio::test]
    async fn test_transaction_ending_between_reads_resolves_standalone() {
        let context = EndingContext {
            database: offline_database().await,
            active: AtomicBool::new(true),
        };

        let target = Target::resolve(&context).await.unwrap();
        assert!(!target.is_transactional());
    }

    #[tokio::test]
    async fn test_session_taken_while_waiting_is_unavailable() {
        let session: SharedSession = Arc::new(tokio::sync::Mutex::new(None));
        let context = DetachedContext {
            database: offline_database().await,
            session,
        };

        let result = Target::resolve(&context).await;
        assert!(matches!(result, Err(RepositoryError::SessionUnavailable)));
    }
}
