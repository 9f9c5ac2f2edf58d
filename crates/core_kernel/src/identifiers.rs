//! Strongly-typed document identifiers
//!
//! Repositories never generate identifiers; callers assign them before
//! insert. [`define_id!`] produces a newtype that renders as
//! `"<PREFIX>-<uuid>"` and is stored as that string under `_id`. New values
//! use time-ordered (v7) UUIDs, so `_id` order follows creation order.
//! Deserialization is as strict as parsing: a stored value without the
//! type's prefix or with a malformed UUID is rejected.

/// Defines a prefixed string identifier type
///
/// ```rust
/// core_kernel::define_id!(InvoiceId, "INV");
///
/// let id = InvoiceId::new();
/// assert!(id.as_str().starts_with("INV-"));
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Creates a new time-ordered identifier
            pub fn new() -> Self {
                Self::from_uuid($crate::__private::uuid::Uuid::now_v7())
            }

            /// Creates an identifier from an existing UUID
            pub fn from_uuid(uuid: $crate::__private::uuid::Uuid) -> Self {
                Self(format!("{}-{}", $prefix, uuid))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the identifier prefix
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::__private::uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Accept the bare UUID as well as the prefixed form
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                let uuid = $crate::__private::uuid::Uuid::parse_str(uuid_str)?;
                Ok(Self::from_uuid(uuid))
            }
        }

        impl $crate::__private::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: $crate::__private::serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> $crate::__private::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: $crate::__private::serde::Deserializer<'de>,
            {
                let raw = <String as $crate::__private::serde::Deserialize>::deserialize(deserializer)?;
                // Stored ids must carry this type's prefix; a bare UUID is only accepted by `FromStr`.
                let valid = raw
                    .strip_prefix(concat!($prefix, "-"))
                    .is_some_and(|uuid| $crate::__private::uuid::Uuid::parse_str(uuid).is_ok());
                if !valid {
                    return Err(<D::Error as $crate::__private::serde::de::Error>::custom(format!(
                        "invalid {} '{}': expected {}-<uuid>",
                        stringify!($name),
                        raw,
                        $prefix
                    )));
                }
                Ok(Self(raw))
            }
        }

        impl From<$name> for $crate::__private::bson::Bson {
            fn from(id: $name) -> Self {
                $crate::__private::bson::Bson::String(id.0)
            }
        }
    };
}

define_id!(DocumentId, "DOC");

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_document_id_display() {
        let id = DocumentId::new();
        assert!(id.to_string().starts_with("DOC-"));
    }

    #[test]
    fn test_id_parsing() {
        let original = DocumentId::new();
        let parsed: DocumentId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_bare_uuid_parsing() {
        let uuid = Uuid::new_v4();
        let parsed: DocumentId = uuid.to_string().parse().unwrap();
        assert_eq!(parsed, DocumentId::from_uuid(uuid));
    }

    #[test]
    fn test_deserialization_validates_prefix_and_uuid() {
        let id = DocumentId::new();
        let stored = bson::Bson::String(id.to_string());
        assert_eq!(bson::from_bson::<DocumentId>(stored).unwrap(), id);

        for raw in ["garbage", "ORD-0191b2a4-5c1e-7000-8000-000000000000", "DOC-not-a-uuid"] {
            let result = bson::from_bson::<DocumentId>(bson::Bson::String(raw.to_string()));
            assert!(result.is_err(), "{} should be rejected", raw);
        }
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = DocumentId::new();
        let value = bson::to_bson(&id).unwrap();
        assert_eq!(value, bson::Bson::String(id.to_string()));
    }
}
