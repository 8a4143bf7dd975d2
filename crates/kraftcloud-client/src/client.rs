//! The remote client contract.

use async_trait::async_trait;
use kraftcloud_core::InstanceId;

use crate::error::Result;
use crate::types::{CreateInstancePayload, CreatedInstance, Instance, InstanceSummary};

/// Trait for instance operations against the control plane.
///
/// This trait abstracts the remote API, allowing the reconciliation engine to
/// run against the HTTP client in production and an in-memory client in
/// tests. Implementations never retry; cancellation happens by dropping the
/// returned future.
#[async_trait]
pub trait InstanceClient: Send + Sync {
    /// Create and boot a new instance.
    ///
    /// The returned record is partial: it identifies the instance but omits
    /// most computed fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects the payload.
    async fn create(&self, payload: &CreateInstancePayload) -> Result<CreatedInstance>;

    /// Fetch the full status of an instance.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the instance does not exist.
    async fn get(&self, uuid: &InstanceId) -> Result<Instance>;

    /// List all instances visible to the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list(&self) -> Result<Vec<InstanceSummary>>;

    /// Delete an instance.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the instance does not exist.
    async fn delete(&self, uuid: &InstanceId) -> Result<()>;
}
