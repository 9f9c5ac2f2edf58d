//! Entity conventions for document collections
//!
//! Every type stored through a repository implements [`Entity`]. The trait
//! carries the declarative collection-name mapping as an associated constant,
//! so a type without a collection name simply does not compile.
//!
//! # Field conventions
//!
//! | Field        | Role                                        |
//! |--------------|---------------------------------------------|
//! | `_id`        | Identifier, set by the caller before insert |
//! | `createdAt`  | Creation timestamp, never updated           |
//! | `createdBy`  | Creating principal, never updated           |
//! | `modifiedAt` | Stamped with the current time on update     |
//!
//! # Example
//!
//! ```rust
//! use bson::DateTime;
//! use core_kernel::Entity;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct Customer {
//!     #[serde(rename = "_id")]
//!     id: String,
//!     name: String,
//!     created_at: DateTime,
//!     created_by: Option<String>,
//!     modified_at: Option<DateTime>,
//! }
//!
//! impl Entity for Customer {
//!     type Id = String;
//!     const COLLECTION: &'static str = "customers";
//!
//!     fn id(&self) -> &String {
//!         &self.id
//!     }
//! }
//! ```

use bson::Bson;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Well-known document field names
pub mod fields {
    pub const ID: &str = "_id";
    pub const CREATED_AT: &str = "createdAt";
    pub const CREATED_BY: &str = "createdBy";
    pub const MODIFIED_AT: &str = "modifiedAt";
}

/// A record type persisted in its own document collection
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Identifier type, serialized under `_id`
    type Id: Serialize + fmt::Display + Send + Sync;

    /// Name of the backing collection
    const COLLECTION: &'static str;

    /// Fields an update must never write
    const IMMUTABLE_FIELDS: &'static [&'static str] =
        &[fields::ID, fields::CREATED_AT, fields::CREATED_BY];

    /// Field that every update stamps with the current time
    const MODIFIED_AT_FIELD: &'static str = fields::MODIFIED_AT;

    /// Returns the document identifier
    fn id(&self) -> &Self::Id;

    /// Checks whether `field` is excluded from updates for this entity type
    fn is_immutable_field(field: &str) -> bool {
        Self::IMMUTABLE_FIELDS.contains(&field)
    }
}

/// Converts an identifier into the BSON value stored under `_id`
pub fn id_to_bson<I: Serialize + ?Sized>(id: &I) -> Result<Bson, CoreError> {
    Ok(bson::to_bson(id)?)
}
