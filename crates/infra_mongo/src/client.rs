//! MongoDB client creation
//!
//! The driver owns connection pooling; this module only turns a
//! [`MongoConfig`] into a configured [`Client`] and offers a connectivity
//! check.

use bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tracing::{debug, info};

use crate::config::MongoConfig;
use crate::error::RepositoryError;

/// Creates a MongoDB client with the given configuration
///
/// The driver connects lazily, so a successful return does not prove the
/// server is reachable; call [`ping`] for that.
///
/// # Errors
///
/// Returns `RepositoryError::Config` if the configuration is invalid and
/// `RepositoryError::Driver` if the connection string cannot be parsed
///
/// # Example
///
/// ```rust,ignore
/// use infra_mongo::{create_client, MongoConfig};
///
/// let config = MongoConfig::from_env()?;
/// let client = create_client(&config).await?;
/// let database = client.database(&config.database);
/// ```
pub async fn create_client(config: &MongoConfig) -> Result<Client, RepositoryError> {
    config.validate()?;

    info!(
        database = %config.database,
        max_pool_size = config.max_pool_size,
        min_pool_size = config.min_pool_size,
        "Creating MongoDB client"
    );

    let mut options = ClientOptions::parse(&config.uri).await?;
    options.app_name = config.app_name.clone().or(options.app_name);
    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(config.connect_timeout_duration());
    options.server_selection_timeout = Some(config.server_selection_timeout_duration());

    let client = Client::with_options(options)?;

    info!("MongoDB client created");
    Ok(client)
}

/// Creates a client for `uri` with default settings
pub async fn create_client_from_uri(uri: &str) -> Result<Client, RepositoryError> {
    create_client(&MongoConfig::new(uri, MongoConfig::default().database)).await
}

/// Verifies that the server behind `database` answers
///
/// # Errors
///
/// Returns the driver error if the `ping` command fails
pub async fn ping(database: &Database) -> Result<(), RepositoryError> {
    database.run_command(doc! { "ping": 1 }).await?;
    debug!(database = %database.name(), "MongoDB ping succeeded");
    Ok(())
}
