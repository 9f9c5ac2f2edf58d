//! Property-Based Test Generators
//!
//! Provides proptest strategies and `fake`-backed helpers for generating
//! customer documents, sort specifications and page windows.

use chrono::{Duration, TimeZone, Utc};
use core_kernel::{PageRequest, SortSpec};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use proptest::prelude::*;

use crate::builders::CustomerBuilder;
use crate::fixtures::Customer;

/// Strategy for customer tiers
pub fn tier_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("bronze".to_string()),
        Just("silver".to_string()),
        Just("gold".to_string()),
    ]
}

/// Strategy for plain field names usable in sort and update documents
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9]{0,15}"
}

/// Strategy for non-empty sort specifications over generated field names
pub fn sort_spec_strategy() -> impl Strategy<Value = SortSpec> {
    prop::collection::vec((field_name_strategy(), any::<bool>()), 1..4).prop_map(|keys| {
        keys.into_iter()
            .fold(SortSpec::new(), |spec, (field, ascending)| {
                if ascending {
                    spec.ascending(field)
                } else {
                    spec.descending(field)
                }
            })
    })
}

/// Strategy for page windows
pub fn page_request_strategy() -> impl Strategy<Value = PageRequest> {
    (0u64..1_000, 0u32..100).prop_map(|(offset, size)| PageRequest::new(offset, size))
}

/// Strategy for customers with arbitrary names, ranks and creation times
pub fn customer_strategy() -> impl Strategy<Value = Customer> {
    (
        "[A-Z][a-z]{1,12} [A-Z][a-z]{1,12}",
        tier_strategy(),
        any::<i32>(),
        0i64..3_650,
    )
        .prop_map(|(name, tier, rank, days)| {
            let base = Utc
                .with_ymd_and_hms(2015, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now);
            CustomerBuilder::new()
                .with_name(name)
                .with_tier(tier)
                .with_rank(rank)
                .created_at(base + Duration::days(days))
                .build()
        })
}

/// Creates a customer with fake name and email
pub fn fake_customer(rank: i32) -> Customer {
    let name: String = Name().fake();
    let email: String = SafeEmail().fake();
    CustomerBuilder::new()
        .with_name(name)
        .with_email(email)
        .with_rank(rank)
        .build()
}

/// Creates `count` fake customers ranked `1..=count`
pub fn fake_customers(count: usize) -> Vec<Customer> {
    (1..=count)
        .map(|rank| fake_customer(i32::try_from(rank).unwrap_or(i32::MAX)))
        .collect()
}
