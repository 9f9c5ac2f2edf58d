//! Pre-built Test Fixtures
//!
//! Provides a sample entity and ready-to-use values for repository tests.
//! The values are fixed so that assertions stay predictable.

use bson::DateTime as BsonDateTime;
use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{define_id, Entity};
use serde::{Deserialize, Serialize};

define_id!(CustomerId, "CUS");

/// Customer document used throughout the repository tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(rename = "_id")]
    pub id: CustomerId,
    pub name: String,
    pub email: Option<String>,
    pub tier: String,
    pub rank: i32,
    pub created_at: BsonDateTime,
    pub created_by: Option<String>,
    pub modified_at: Option<BsonDateTime>,
}

impl Entity for Customer {
    type Id = CustomerId;
    const COLLECTION: &'static str = "customers";

    fn id(&self) -> &CustomerId {
        &self.id
    }
}

/// Name and email only, for projection tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub name: String,
    pub email: Option<String>,
}

/// Output row of a group-by-tier aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierCount {
    #[serde(rename = "_id")]
    pub tier: String,
    pub count: i32,
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Creation instant of every fixture customer (Jan 1, 2024)
    pub fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// A later instant used as a fixed "now" for update stamps
    pub fn update_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// The creation instant at BSON (millisecond) precision
    pub fn created_at_bson() -> BsonDateTime {
        BsonDateTime::from_chrono(Self::created_at())
    }
}

/// Fixture for string values
pub struct StringFixtures;

impl StringFixtures {
    pub fn creator() -> &'static str {
        "fixture-loader"
    }

    pub fn gold_tier() -> &'static str {
        "gold"
    }

    pub fn silver_tier() -> &'static str {
        "silver"
    }
}

/// Fixture for customers
pub struct CustomerFixtures;

impl CustomerFixtures {
    /// A fully populated gold-tier customer
    pub fn ada() -> Customer {
        Customer {
            id: CustomerId::new(),
            name: "Ada Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            tier: StringFixtures::gold_tier().to_string(),
            rank: 1,
            created_at: TemporalFixtures::created_at_bson(),
            created_by: Some(StringFixtures::creator().to_string()),
            modified_at: None,
        }
    }

    /// A silver-tier customer without an email address
    pub fn grace() -> Customer {
        Customer {
            id: CustomerId::new(),
            name: "Grace Hopper".to_string(),
            email: None,
            tier: StringFixtures::silver_tier().to_string(),
            rank: 2,
            created_at: TemporalFixtures::created_at_bson(),
            created_by: Some(StringFixtures::creator().to_string()),
            modified_at: None,
        }
    }

    /// `count` customers ranked `1..=count`, all in the gold tier
    pub fn ranked(count: i32) -> Vec<Customer> {
        (1..=count)
            .map(|rank| Customer {
                id: CustomerId::new(),
                name: format!("Customer {rank:02}"),
                email: Some(format!("customer{rank}@example.com")),
                tier: StringFixtures::gold_tier().to_string(),
                rank,
                created_at: TemporalFixtures::created_at_bson(),
                created_by: None,
                modified_at: None,
            })
            .collect()
    }
}
