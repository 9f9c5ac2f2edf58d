//! Partial update documents
//!
//! Updates are never full-document replacements. An [`UpdateDiff`] holds only
//! the fields an update is allowed to write:
//!
//! - identifier and creation-audit fields (`Entity::IMMUTABLE_FIELDS`) are
//!   never included
//! - absent values (BSON `null`) are skipped
//! - the modification timestamp is always stamped with the supplied clock time,
//!   whatever the entity held in memory
//!
//! A diff is produced either from a whole entity ([`UpdateDiff::from_entity`])
//! or from an explicit list of changes ([`UpdateBuilder`]).

use bson::{doc, Bson, DateTime as BsonDateTime, Document};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::marker::PhantomData;

use crate::entity::Entity;
use crate::error::CoreError;

/// The set of field writes applied by a single update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDiff {
    set: Document,
    unset: Document,
}

impl UpdateDiff {
    /// Computes the diff for an entity instance
    ///
    /// # Arguments
    ///
    /// * `entity` - The entity carrying the new field values
    /// * `now` - The time stamped into the modification field
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if the entity does not serialize to
    /// a BSON document
    pub fn from_entity<E: Entity>(entity: &E, now: DateTime<Utc>) -> Result<Self, CoreError> {
        let document = bson::to_document(entity)?;

        let mut set = Document::new();
        for (field, value) in document {
            if E::is_immutable_field(&field) || field == E::MODIFIED_AT_FIELD {
                continue;
            }
            if matches!(value, Bson::Null | Bson::Undefined) {
                continue;
            }
            set.insert(field, value);
        }
        set.insert(E::MODIFIED_AT_FIELD, BsonDateTime::from_chrono(now));

        Ok(Self {
            set,
            unset: Document::new(),
        })
    }

    /// Starts an explicit update for entity type `E`
    pub fn builder<E: Entity>() -> UpdateBuilder<E> {
        UpdateBuilder::new()
    }

    /// Fields written with `$set`, including the modification stamp
    pub fn set_fields(&self) -> &Document {
        &self.set
    }

    /// Fields removed with `$unset`
    pub fn unset_fields(&self) -> impl Iterator<Item = &str> {
        self.unset.keys().map(String::as_str)
    }

    /// Checks whether the update writes `field` in any way
    pub fn touches(&self, field: &str) -> bool {
        self.set.contains_key(field) || self.unset.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.set.get(field)
    }

    /// Number of fields written, counting the modification stamp
    pub fn len(&self) -> usize {
        self.set.len() + self.unset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders the update operators document (`$set` and, if needed, `$unset`)
    pub fn into_document(self) -> Document {
        let mut update = doc! { "$set": self.set };
        if !self.unset.is_empty() {
            update.insert("$unset", self.unset);
        }
        update
    }
}

/// Builder for updates where the caller states which fields changed
///
/// Writes to immutable fields are recorded and reported by [`build`](Self::build)
/// so a chain of calls stays readable.
///
/// # Example
///
/// ```rust,ignore
/// let diff = UpdateDiff::builder::<Customer>()
///     .set("name", "Ada Lovelace")
///     .unset("nickname")
///     .build(clock.now())?;
/// ```
#[derive(Debug)]
pub struct UpdateBuilder<E: Entity> {
    set: Document,
    unset: Document,
    rejected: Option<CoreError>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> UpdateBuilder<E> {
    pub fn new() -> Self {
        Self {
            set: Document::new(),
            unset: Document::new(),
            rejected: None,
            _entity: PhantomData,
        }
    }

    /// Sets `field` to `value`
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        let field = field.into();
        if self.check_writable(&field) {
            self.unset.remove(&field);
            self.set.insert(field, value.into());
        }
        self
    }

    /// Sets `field` to the BSON form of any serializable value
    pub fn set_serialized<T: Serialize + ?Sized>(self, field: impl Into<String>, value: &T) -> Self {
        match bson::to_bson(value) {
            Ok(value) => self.set(field, value),
            Err(e) => self.reject(CoreError::from(e)),
        }
    }

    /// Removes `field` from the stored document
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if self.check_writable(&field) {
            self.set.remove(&field);
            self.unset.insert(field, "");
        }
        self
    }

    /// Finishes the update, stamping the modification field with `now`
    ///
    /// # Errors
    ///
    /// Returns the first rejected write, e.g. `CoreError::ImmutableField`
    pub fn build(self, now: DateTime<Utc>) -> Result<UpdateDiff, CoreError> {
        if let Some(error) = self.rejected {
            return Err(error);
        }

        let mut set = self.set;
        set.insert(E::MODIFIED_AT_FIELD, BsonDateTime::from_chrono(now));

        Ok(UpdateDiff {
            set,
            unset: self.unset,
        })
    }

    fn check_writable(&mut self, field: &str) -> bool {
        // A dotted path writes into its top-level field.
        let root = field.split('.').next().unwrap_or(field);
        if E::is_immutable_field(root) || root == E::MODIFIED_AT_FIELD {
            let error = CoreError::ImmutableField(field.to_string());
            self.rejected.get_or_insert(error);
            return false;
        }
        true
    }

    fn reject(mut self, error: CoreError) -> Self {
        self.rejected.get_or_insert(error);
        self
    }
}

impl<E: Entity> Default for UpdateBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}
