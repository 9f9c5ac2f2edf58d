//! Database Test Utilities
//!
//! Provides a MongoDB testcontainer running as a single-node replica set,
//! which is required for multi-document transactions. Each test gets its own
//! database on the shared container, so tests stay isolated without paying
//! for a container per test.

use bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tokio::sync::OnceCell;
use tokio::time::sleep;
use uuid::Uuid;

use infra_mongo::MongoDbContext;

/// Default MongoDB image for testing
const MONGO_IMAGE: &str = "mongo";
const MONGO_TAG: &str = "7.0";
const MONGO_PORT: u16 = 27017;
const REPLICA_SET: &str = "rs0";

type HarnessError = Box<dyn std::error::Error + Send + Sync>;

/// A MongoDB replica-set container
///
/// Only the connection string is kept: a driver client is bound to the
/// runtime it was created on, and every `#[tokio::test]` has its own.
pub struct MongoTestHarness {
    _container: ContainerAsync<GenericImage>,
    uri: String,
}

impl MongoTestHarness {
    /// Starts a new MongoDB container and initiates its replica set
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to start or the replica set
    /// never elects a primary
    pub async fn start() -> Result<Self, HarnessError> {
        let container = GenericImage::new(MONGO_IMAGE, MONGO_TAG)
            .with_exposed_port(MONGO_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"))
            .with_cmd(["--replSet", REPLICA_SET, "--bind_ip_all"])
            .start()
            .await?;

        let port = container.get_host_port_ipv4(MONGO_PORT).await?;
        let host = container.get_host().await?.to_string();
        // The member advertises its in-container address, so connect directly.
        let uri = format!("mongodb://{host}:{port}/?directConnection=true");

        let client = connect(&uri).await?;
        initiate_replica_set(&client).await?;

        Ok(Self {
            _container: container,
            uri,
        })
    }

    /// Connection string of the running container
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Connects a new client on the current runtime
    ///
    /// # Errors
    ///
    /// Returns the driver error if the connection string cannot be parsed
    pub async fn client(&self) -> Result<Client, HarnessError> {
        connect(&self.uri).await
    }

    /// Returns a database with a unique name for a single test
    pub async fn fresh_database(&self) -> Result<Database, HarnessError> {
        Ok(self.client().await?.database(&unique_database_name()))
    }

    /// Creates a context over a fresh database
    pub async fn fresh_context(&self) -> Result<Arc<MongoDbContext>, HarnessError> {
        let client = self.client().await?;
        Ok(Arc::new(MongoDbContext::new(client, &unique_database_name())))
    }
}

async fn connect(uri: &str) -> Result<Client, HarnessError> {
    let options = ClientOptions::parse(uri).await?;
    Ok(Client::with_options(options)?)
}

fn unique_database_name() -> String {
    format!("test_{}", Uuid::new_v4().simple())
}

/// Initiates a single-member replica set and waits for it to become primary
///
/// Polls `hello` with exponential backoff: 250ms doubling up to 2s, for at
/// most 40 attempts.
async fn initiate_replica_set(client: &Client) -> Result<(), HarnessError> {
    let admin = client.database("admin");
    admin
        .run_command(doc! {
            "replSetInitiate": {
                "_id": REPLICA_SET,
                "members": [{ "_id": 0, "host": format!("localhost:{MONGO_PORT}") }],
            }
        })
        .await?;

    let max_attempts = 40;
    let max_delay = Duration::from_secs(2);
    let mut delay = Duration::from_millis(250);

    for attempt in 1..=max_attempts {
        match admin.run_command(doc! { "hello": 1 }).await {
            Ok(reply) if reply.get_bool("isWritablePrimary").unwrap_or(false) => {
                tracing::info!(attempt, "MongoDB replica set primary elected");
                return Ok(());
            }
            Ok(_) => {
                tracing::debug!(attempt, "Replica set has no primary yet");
            }
            Err(error) => {
                tracing::debug!(attempt, %error, "Replica set status check failed");
            }
        }

        sleep(delay).await;
        delay = std::cmp::min(delay.saturating_mul(2), max_delay);
    }

    Err(format!("Replica set {REPLICA_SET} elected no primary after {max_attempts} attempts").into())
}

/// Global container shared by every test in a binary
static SHARED_HARNESS: OnceCell<Arc<MongoTestHarness>> = OnceCell::const_new();

/// Gets or starts the shared MongoDB container
///
/// # Panics
///
/// Panics if the container fails to start
pub async fn get_shared_harness() -> Arc<MongoTestHarness> {
    SHARED_HARNESS
        .get_or_init(|| async {
            crate::logging::init_test_tracing();
            Arc::new(
                MongoTestHarness::start()
                    .await
                    .expect("Failed to start MongoDB test container"),
            )
        })
        .await
        .clone()
}

/// Helper macro for running repository tests against a fresh database
///
/// The body sees `context: Arc<MongoDbContext>` bound to a database no other
/// test uses.
#[macro_export]
macro_rules! mongo_test {
    ($name:ident, |$context:ident| $body:block) => {
        #[tokio::test]
        #[ignore = "requires docker (testcontainers)"]
        async fn $name() {
            let harness = $crate::database::get_shared_harness().await;
            let $context = harness
                .fresh_context()
                .await
                .expect("Failed to create test context");
            $body
        }
    };
}
