//! Infrastructure MongoDB Layer
//!
//! This crate provides persistence for document entities on MongoDB using
//! the official driver.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: one generic
//! [`MongoRepository`] serves every type implementing
//! [`core_kernel::Entity`], and each call consults an ambient [`DbContext`]
//! to decide whether it runs standalone or inside the active transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_mongo::{create_client, DocumentRepository, MongoConfig, MongoDbContext, MongoRepository};
//!
//! let config = MongoConfig::from_env()?;
//! let client = create_client(&config).await?;
//! let context = Arc::new(MongoDbContext::new(client, &config.database));
//!
//! let customers = MongoRepository::<Customer>::new(context.clone())?;
//! let found = customers.find_by_id(&customer_id).await?;
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod repositories;

pub use client::{create_client, create_client_from_uri, ping};
pub use config::MongoConfig;
pub use context::{DbContext, MongoDbContext, SharedSession};
pub use error::RepositoryError;
pub use repositories::{DocumentRepository, MongoRepository};
