//! Core Kernel - Foundational types for document repositories
//!
//! This crate provides the driver-agnostic building blocks used by the
//! repository layer:
//! - The `Entity` trait and its field conventions
//! - Partial update diffs that never touch identifier or creation-audit fields
//! - Sort and paging specifications
//! - A startup-time registry of entity type to collection name
//! - A clock port and prefixed identifiers

pub mod clock;
pub mod entity;
pub mod error;
pub mod identifiers;
pub mod query;
pub mod registry;
pub mod update;

pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use entity::{fields, id_to_bson, Entity};
pub use error::CoreError;
pub use identifiers::DocumentId;
pub use query::{PageRequest, SortDirection, SortSpec};
pub use registry::{validate_collection_name, CollectionRegistration, CollectionRegistry};
pub use update::{UpdateBuilder, UpdateDiff};

#[doc(hidden)]
pub mod __private {
    pub use bson;
    pub use serde;
    pub use uuid;
}
