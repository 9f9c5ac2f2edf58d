//! Test Data Builders
//!
//! Provides a builder for customer documents with sensible defaults, so
//! tests only spell out the fields they assert on.

use bson::DateTime as BsonDateTime;
use chrono::{DateTime, Utc};

use crate::fixtures::{Customer, CustomerId, StringFixtures, TemporalFixtures};

/// Builder for constructing test customers
pub struct CustomerBuilder {
    id: CustomerId,
    name: String,
    email: Option<String>,
    tier: String,
    rank: i32,
    created_at: BsonDateTime,
    created_by: Option<String>,
    modified_at: Option<BsonDateTime>,
}

impl Default for CustomerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomerBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            id: CustomerId::new(),
            name: "Test Customer".to_string(),
            email: None,
            tier: StringFixtures::silver_tier().to_string(),
            rank: 0,
            created_at: TemporalFixtures::created_at_bson(),
            created_by: Some(StringFixtures::creator().to_string()),
            modified_at: None,
        }
    }

    pub fn with_id(mut self, id: CustomerId) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = tier.into();
        self
    }

    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    /// Sets the creation instant (truncated to milliseconds)
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = BsonDateTime::from_chrono(at);
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = Some(actor.into());
        self
    }

    /// Pre-sets the modification stamp, as if the document had been updated
    pub fn modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = Some(BsonDateTime::from_chrono(at));
        self
    }

    /// Builds the customer
    pub fn build(self) -> Customer {
        Customer {
            id: self.id,
            name: self.name,
            email: self.email,
            tier: self.tier,
            rank: self.rank,
            created_at: self.created_at,
            created_by: self.created_by,
            modified_at: self.modified_at,
        }
    }
}
