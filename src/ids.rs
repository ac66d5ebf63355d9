//! Newtype identifiers
//!
//! Catalog entities are keyed by human-chosen slugs ("cotton", "dtg").
//! Draft-side records get generated UUIDs.

use uuid::Uuid;

/// Defines a slug-backed identifier for a catalog record.
macro_rules! define_slug_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

/// Defines a UUID-backed identifier minted by the engine.
macro_rules! define_generated_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_slug_id!(FabricId);
define_slug_id!(PrintTypeId);
define_slug_id!(ColorId);
define_slug_id!(ProductId);

define_generated_id!(DraftId);
define_generated_id!(ColorVariantId);
define_generated_id!(PrintAreaId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_ids_serialize_transparently() {
        let id = FabricId::new("cotton");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""cotton""#);
        assert_eq!(id.to_string(), "cotton");
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(DraftId::generate(), DraftId::generate());
    }
}
