//! Identifier types for KraftCloud resources.
//!
//! Every remote object is addressed by a server-assigned UUID. Wrapping each
//! kind in its own type keeps an instance UUID from being passed where a
//! service group or network interface UUID is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server-assigned identifier of an instance.
///
/// Absent until the remote create call returns, then immutable for the
/// lifetime of the record. It is the only handle used for status fetches,
/// deletion and import.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceId(uuid::Uuid);

/// Server-assigned identifier of a service group.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceGroupId(uuid::Uuid);

/// Server-assigned identifier of a network interface.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceId(uuid::Uuid);

macro_rules! uuid_identifier {
    ($name:ident) => {
        impl $name {
            /// Create a new identifier from a UUID.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a new random identifier.
            ///
            /// Only the remote API assigns identifiers in production; this is
            /// used by in-memory clients and tests.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Return the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(IdError::Empty);
                }
                let uuid = uuid::Uuid::parse_str(trimmed)
                    .map_err(|_| IdError::InvalidUuid(trimmed.to_string()))?;
                Ok(Self(uuid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

uuid_identifier!(InstanceId);
uuid_identifier!(ServiceGroupId);
uuid_identifier!(InterfaceId);

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input was empty or whitespace.
    #[error("identifier is empty")]
    Empty,

    /// The input is not a valid UUID.
    #[error("invalid UUID format: {0:?}")]
    InvalidUuid(String),
}
