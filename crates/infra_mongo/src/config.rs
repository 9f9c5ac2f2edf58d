//! MongoDB connection configuration
//!
//! Settings are read from `MONGO_`-prefixed environment variables (after an
//! optional `.env` file is loaded) or assembled in code with the builder
//! methods.
//!
//! # Environment Variables
//!
//! * `MONGO_URI` - Connection string (default: `mongodb://localhost:27017`)
//! * `MONGO_DATABASE` - Database name (default: `app`)
//! * `MONGO_APP_NAME` - Application name reported to the server
//! * `MONGO_MAX_POOL_SIZE` - Maximum connections per server (default: 10)
//! * `MONGO_MIN_POOL_SIZE` - Minimum connections per server (default: 0)
//! * `MONGO_CONNECT_TIMEOUT_SECS` - Connect timeout (default: 10)
//! * `MONGO_SERVER_SELECTION_TIMEOUT_SECS` - Server selection timeout (default: 30)

use serde::Deserialize;
use std::time::Duration;

use crate::error::RepositoryError;

/// Configuration options for the MongoDB client
///
/// # Example
///
/// ```rust
/// use infra_mongo::MongoConfig;
///
/// let config = MongoConfig::new("mongodb://localhost:27017", "crm")
///     .max_pool_size(20)
///     .app_name("crm-api");
/// assert_eq!(config.max_pool_size, 20);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    /// MongoDB connection string
    pub uri: String,
    /// Database holding the entity collections
    pub database: String,
    /// Application name sent in the connection handshake
    pub app_name: Option<String>,
    /// Maximum number of connections per server
    pub max_pool_size: u32,
    /// Minimum number of connections kept per server
    pub min_pool_size: u32,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Server selection timeout in seconds
    pub server_selection_timeout_secs: u64,
}

impl MongoConfig {
    /// Creates a configuration for `database` at `uri` with default pool settings
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from the environment
    ///
    /// A `.env` file in the working directory is read first if present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Config` if a variable cannot be parsed or the
    /// resulting configuration is invalid
    pub fn from_env() -> Result<Self, RepositoryError> {
        dotenvy::dotenv().ok();

        let config: Self = config::Config::builder()
            .add_source(config::Environment::with_prefix("MONGO").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the driver would reject
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Config` describing the first invalid value
    pub fn validate(&self) -> Result<(), RepositoryError> {
        if self.uri.trim().is_empty() {
            return Err(RepositoryError::config("MONGO_URI is empty"));
        }
        if self.database.trim().is_empty() {
            return Err(RepositoryError::config("MONGO_DATABASE is empty"));
        }
        if self.max_pool_size == 0 {
            return Err(RepositoryError::config("max_pool_size must be at least 1"));
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(RepositoryError::config(format!(
                "min_pool_size ({}) exceeds max_pool_size ({})",
                self.min_pool_size, self.max_pool_size
            )));
        }
        Ok(())
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Sets the maximum number of connections per server (default: 10)
    pub fn max_pool_size(mut self, max: u32) -> Self {
        self.max_pool_size = max;
        self
    }

    /// Sets the minimum number of connections per server (default: 0)
    pub fn min_pool_size(mut self, min: u32) -> Self {
        self.min_pool_size = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs();
        self
    }

    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout_secs = timeout.as_secs();
        self
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn server_selection_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.server_selection_timeout_secs)
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "app".to_string(),
            app_name: None,
            max_pool_size: 10,
            min_pool_size: 0,
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 30,
        }
    }
}
