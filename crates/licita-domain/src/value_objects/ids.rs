//! Strongly typed identifiers.
//!
//! Thin wrappers around `String`/`Uuid` so cross-component code cannot
//! accidentally pass an opportunity id where a company id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Generates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Wraps an existing string as an identifier.
            #[must_use]
            pub fn from_string(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(CompanyId);
string_id!(OpportunityId);
string_id!(DocumentId);
string_id!(ChunkId);

/// Identity of an opportunity within the catalog: `(provider_name,
/// external_id)`. This pair is the primary key per spec §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderKey {
    /// Lowercase provider tag, e.g. `rest_portal`, `scrape_portal`.
    pub provider_name: String,
    /// Unique identifier within the provider.
    pub external_id: String,
}

impl ProviderKey {
    /// Builds a new provider key.
    #[must_use]
    pub fn new(provider_name: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            external_id: external_id.into(),
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_name, self.external_id)
    }
}
