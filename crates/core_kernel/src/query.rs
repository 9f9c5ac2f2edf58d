//! Sort and paging specifications
//!
//! Sort expressions are driver-level: they become the `sort` document of a
//! find operation unchanged. Two textual forms are accepted:
//!
//! - JSON document: `{"rank": 1, "name": -1}`
//! - compact list: `rank,-name` (a leading `+` is allowed)

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Direction of a single sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

/// An ordered list of sort keys
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortSpec {
    keys: Vec<(String, SortDirection)>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ascending(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), SortDirection::Ascending));
        self
    }

    pub fn descending(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), SortDirection::Descending));
        self
    }

    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Builds a spec from a sort document such as `{ rank: 1 }`
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSort` if a value is not `1` or `-1`
    pub fn from_document(document: &Document) -> Result<Self, CoreError> {
        let mut spec = Self::new();
        for (field, value) in document {
            let direction = match value {
                Bson::Int32(1) | Bson::Int64(1) => SortDirection::Ascending,
                Bson::Int32(-1) | Bson::Int64(-1) => SortDirection::Descending,
                Bson::Double(d) if *d == 1.0 => SortDirection::Ascending,
                Bson::Double(d) if *d == -1.0 => SortDirection::Descending,
                other => {
                    return Err(CoreError::invalid_sort(format!(
                        "direction for '{}' must be 1 or -1, got {}",
                        field, other
                    )))
                }
            };
            spec.keys.push((field.clone(), direction));
        }
        Ok(spec)
    }

    /// Renders the spec as the driver's sort document
    pub fn to_document(&self) -> Document {
        self.keys
            .iter()
            .map(|(field, direction)| (field.clone(), Bson::Int32(direction.as_i32())))
            .collect()
    }

    fn parse_compact(expression: &str) -> Result<Self, CoreError> {
        let mut spec = Self::new();
        for part in expression.split(',') {
            let part = part.trim();
            let (field, direction) = match part.strip_prefix('-') {
                Some(field) => (field, SortDirection::Descending),
                None => (part.strip_prefix('+').unwrap_or(part), SortDirection::Ascending),
            };
            if field.is_empty() {
                return Err(CoreError::invalid_sort(format!(
                    "empty field name in '{}'",
                    expression
                )));
            }
            spec.keys.push((field.to_string(), direction));
        }
        Ok(spec)
    }
}

impl FromStr for SortSpec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expression = s.trim();
        if expression.is_empty() {
            return Err(CoreError::invalid_sort("expression is empty"));
        }

        if expression.starts_with('{') {
            // Deserializing straight into a Document keeps the key order.
            let document: Document = serde_json::from_str(expression)
                .map_err(|e| CoreError::invalid_sort(e.to_string()))?;
            return Self::from_document(&document);
        }

        Self::parse_compact(expression)
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .keys
            .iter()
            .map(|(field, direction)| match direction {
                SortDirection::Ascending => field.clone(),
                SortDirection::Descending => format!("-{}", field),
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// A window over a sorted result set
///
/// Both bounds are unsigned, so a negative offset or page size cannot be
/// expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Number of matching documents to skip
    pub offset: u64,
    /// Maximum number of documents to return
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(offset: u64, page_size: u32) -> Self {
        Self { offset, page_size }
    }

    /// Page number `index` (zero based) of pages holding `page_size` documents
    pub fn page(index: u64, page_size: u32) -> Self {
        Self {
            offset: index.saturating_mul(u64::from(page_size)),
            page_size,
        }
    }

    /// The request for the page following this one
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(u64::from(self.page_size)),
            page_size: self.page_size,
        }
    }
}
