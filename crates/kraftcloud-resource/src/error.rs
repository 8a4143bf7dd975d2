//! Error types for instance reconciliation.
//!
//! [`ValidationError`] is raised before any remote call, [`MergeError`] when
//! API responses cannot be combined into a state record, and
//! [`ResourceError`] wraps both together with remote failures for the
//! lifecycle operations.

use kraftcloud_client::{ClientError, IdError, InstanceId};
use thiserror::Error;

use crate::lifecycle::Phase;
use crate::state::InstanceState;

/// A result type using `ResourceError`.
pub type Result<T> = std::result::Result<T, ResourceError>;

/// A desired value violates a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for {attribute}: {constraint}")]
pub struct ValidationError {
    /// Attribute path, e.g. `service_group.services[0].port`.
    pub attribute: String,
    /// The violated constraint.
    pub constraint: String,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(attribute: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            constraint: constraint.into(),
        }
    }
}

/// API responses could not be merged into a state record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// Two sources disagree on the instance identifier.
    #[error("instance identifier mismatch: expected {expected}, got {actual}")]
    UuidMismatch {
        /// Identifier already known.
        expected: InstanceId,
        /// Identifier found in the response.
        actual: InstanceId,
    },

    /// A field needed to build the record was in none of the sources.
    #[error("no source provides required field {0}")]
    MissingField(&'static str),
}

/// Remote operation kinds, for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    /// Instance creation.
    Create,
    /// Status fetch.
    Get,
    /// Listing.
    List,
    /// Deletion.
    Delete,
}

impl std::fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::List => "list",
            Self::Delete => "delete",
        })
    }
}

fn describe_uuid(uuid: Option<&InstanceId>) -> String {
    uuid.map_or_else(String::new, |id| format!(" instance {id}"))
}

/// Errors returned by lifecycle operations.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The desired configuration is invalid. No remote call was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A remote call failed.
    #[error("failed to {operation}{}: {source}", describe_uuid(.uuid.as_ref()))]
    Remote {
        /// The failing operation.
        operation: RemoteOperation,
        /// The addressed instance, if known.
        uuid: Option<InstanceId>,
        /// The client error.
        #[source]
        source: ClientError,
    },

    /// Update was requested for a resource that only supports replacement.
    #[error(
        "instance does not support in-place updates; changes to [{}] should have triggered a replacement",
        .changed.join(", ")
    )]
    Unsupported {
        /// Attribute paths that differ from the prior state.
        changed: Vec<String>,
    },

    /// The instance was created but its status could not be fetched.
    ///
    /// The instance exists remotely. `partial_state` describes it as far as
    /// the create response allows.
    #[error("instance {uuid} was created but its status could not be fetched: {source}")]
    PartialCreate {
        /// Identifier of the created instance.
        uuid: InstanceId,
        /// Provisional state built from the create response.
        partial_state: Box<InstanceState>,
        /// Why the status fetch did not complete: a remote error or
        /// cancellation.
        #[source]
        source: Box<ResourceError>,
    },

    /// The orchestrator attempted an invalid phase transition.
    #[error("invalid lifecycle transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current phase.
        from: Phase,
        /// Requested phase.
        to: Phase,
    },

    /// Responses could not be merged.
    #[error("failed to merge instance state: {0}")]
    Merge(#[from] MergeError),

    /// The import identifier is not an instance UUID.
    #[error("invalid import identifier: {0}")]
    InvalidImportId(#[from] IdError),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl ResourceError {
    pub(crate) const fn remote(
        operation: RemoteOperation,
        uuid: Option<InstanceId>,
        source: ClientError,
    ) -> Self {
        Self::Remote {
            operation,
            uuid,
            source,
        }
    }

    /// Returns true if the remote resource was reported absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Remote { source, .. } if source.is_not_found())
    }

    /// Returns true if this error might be resolved by retrying.
    ///
    /// Nothing in this crate retries; the flag is for the caller.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Remote { source, .. } => source.is_retriable(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a contract violation between the
    /// host and this crate rather than a user or remote problem.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Unsupported { .. } | Self::InvalidTransition { .. } | Self::Merge(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_attribute() {
        let err = ValidationError::new("memory_mb", "must be between 16 and 256, got 512");
        assert_eq!(
            err.to_string(),
            "invalid value for memory_mb: must be between 16 and 256, got 512"
        );
    }

    #[test]
    fn remote_message_includes_uuid() {
        let uuid = InstanceId::generate();
        let err = ResourceError::remote(
            RemoteOperation::Get,
            Some(uuid),
            ClientError::Request("timed out".into()),
        );
        assert_eq!(
            err.to_string(),
            format!("failed to get instance {uuid}: request failed: timed out")
        );
        assert!(err.is_retriable());
        assert!(!err.is_internal());

        let err = ResourceError::remote(
            RemoteOperation::Create,
            None,
            ClientError::Api {
                status: 400,
                message: "bad image".into(),
            },
        );
        assert_eq!(err.to_string(), "failed to create: API error (400): bad image");
        assert!(!err.is_retriable());
    }

    #[test]
    fn not_found_is_detected_through_remote() {
        let err = ResourceError::remote(
            RemoteOperation::Get,
            None,
            ClientError::NotFound("x".into()),
        );
        assert!(err.is_not_found());
        assert!(!ResourceError::Cancelled.is_not_found());
    }

    #[test]
    fn unsupported_is_internal() {
        let err = ResourceError::Unsupported {
            changed: vec!["image".into(), "memory_mb".into()],
        };
        assert!(err.is_internal());
        assert!(err.to_string().contains("[image, memory_mb]"));
        assert!(!ResourceError::Cancelled.is_internal());
    }
}
