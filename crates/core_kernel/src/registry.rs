//! Collection Registry
//!
//! Maps entity types to their backing collections at startup. Each entity
//! type declares its collection name as `Entity::COLLECTION`; registering the
//! type validates that name once, so a bad declaration stops the process
//! during boot instead of failing the first request that touches it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use core_kernel::CollectionRegistry;
//!
//! let registry = CollectionRegistry::new()
//!     .register::<Customer>()?
//!     .register::<Invoice>()?;
//!
//! assert_eq!(registry.collection_name::<Customer>()?, "customers");
//! ```

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use crate::entity::Entity;
use crate::error::CoreError;

/// Longest collection name accepted, in bytes
pub const MAX_COLLECTION_NAME_LEN: usize = 255;

/// Checks that `name` is usable as a collection name
///
/// # Errors
///
/// Returns `CoreError::Configuration` if the name is empty, too long,
/// contains `$` or a NUL byte, or lives in the reserved `system.` namespace
pub fn validate_collection_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::configuration("collection name is empty"));
    }
    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(CoreError::configuration(format!(
            "collection name '{}' exceeds {} bytes",
            name, MAX_COLLECTION_NAME_LEN
        )));
    }
    if name.contains('$') || name.contains('\0') {
        return Err(CoreError::configuration(format!(
            "collection name '{}' contains a reserved character",
            name.escape_debug()
        )));
    }
    if name.starts_with("system.") {
        return Err(CoreError::configuration(format!(
            "collection name '{}' is in the reserved system namespace",
            name
        )));
    }
    Ok(())
}

/// Registration information for an entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRegistration {
    /// Rust type name of the entity
    pub entity: &'static str,
    /// Backing collection
    pub collection: &'static str,
}

/// Startup-time table of entity type to collection name
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    entries: HashMap<TypeId, CollectionRegistration>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers entity type `E`, validating its collection name
    ///
    /// Registering the same type twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if `E::COLLECTION` is invalid
    pub fn register<E: Entity>(mut self) -> Result<Self, CoreError> {
        validate_collection_name(E::COLLECTION).map_err(|e| {
            CoreError::configuration(format!("entity {}: {}", type_name::<E>(), e))
        })?;

        self.entries.insert(
            TypeId::of::<E>(),
            CollectionRegistration {
                entity: type_name::<E>(),
                collection: E::COLLECTION,
            },
        );
        Ok(self)
    }

    /// Returns the collection name registered for `E`
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if `E` was never registered
    pub fn collection_name<E: Entity>(&self) -> Result<&'static str, CoreError> {
        self.entries
            .get(&TypeId::of::<E>())
            .map(|entry| entry.collection)
            .ok_or_else(|| {
                CoreError::configuration(format!(
                    "entity {} has no registered collection",
                    type_name::<E>()
                ))
            })
    }

    pub fn contains<E: Entity>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<E>())
    }

    /// Returns all registrations, sorted by collection name
    pub fn registrations(&self) -> Vec<CollectionRegistration> {
        let mut registrations: Vec<_> = self.entries.values().cloned().collect();
        registrations.sort_by(|a, b| a.collection.cmp(b.collection).then(a.entity.cmp(b.entity)));
        registrations
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
