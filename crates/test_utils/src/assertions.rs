//! Custom Test Assertions
//!
//! Provides assertion helpers for audit stamps and result ordering that
//! give more meaningful failure messages than plain `assert!`.

use bson::DateTime as BsonDateTime;
use chrono::{DateTime, Duration, Utc};

use crate::fixtures::Customer;

/// Asserts that a BSON timestamp lies within `tolerance` of `expected`
///
/// # Panics
///
/// Panics if the timestamps differ by more than the tolerance
pub fn assert_instant_near(actual: BsonDateTime, expected: DateTime<Utc>, tolerance: Duration) {
    let diff = (actual.to_chrono() - expected).abs();
    assert!(
        diff <= tolerance,
        "Timestamps differ by more than tolerance: actual={}, expected={}, diff={}ms, tolerance={}ms",
        actual.to_chrono(),
        expected,
        diff.num_milliseconds(),
        tolerance.num_milliseconds()
    );
}

/// Asserts that the customer carries a modification stamp near `expected`
pub fn assert_stamped_near(customer: &Customer, expected: DateTime<Utc>, tolerance: Duration) {
    match customer.modified_at {
        Some(stamp) => assert_instant_near(stamp, expected, tolerance),
        None => panic!("Expected customer {} to carry a modification stamp", customer.id),
    }
}

/// Asserts that the stored creation-audit fields match the original ones
pub fn assert_creation_audit_preserved(stored: &Customer, original: &Customer) {
    assert_eq!(
        stored.created_at, original.created_at,
        "createdAt changed for customer {}",
        original.id
    );
    assert_eq!(
        stored.created_by, original.created_by,
        "createdBy changed for customer {}",
        original.id
    );
}

/// Asserts that customers come back with exactly the given ranks, in order
pub fn assert_ranks(customers: &[Customer], expected: &[i32]) {
    let ranks: Vec<i32> = customers.iter().map(|c| c.rank).collect();
    assert_eq!(ranks, expected, "Unexpected rank order");
}
