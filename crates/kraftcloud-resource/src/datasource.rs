//! Read-only data sources.
//!
//! Unlike the resource, a data source has no prior state: it reports the
//! server's values as they are, including the resolved image.

use std::sync::Arc;

use kraftcloud_client::{InstanceClient, InstanceId, InstanceSummary};
use tokio_util::sync::CancellationToken;

use crate::error::{RemoteOperation, ResourceError, Result};
use crate::merge::{merge, MergeBase};
use crate::resource::cancellable;
use crate::state::InstanceState;

/// The `kraftcloud_instance` data source.
pub struct InstanceDataSource<C: InstanceClient> {
    client: Arc<C>,
}

impl<C: InstanceClient> InstanceDataSource<C> {
    /// Create a new data source over `client`.
    #[must_use]
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Look up one instance.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Remote` if the instance cannot be fetched,
    /// including when it does not exist.
    pub async fn read(&self, token: &CancellationToken, uuid: &InstanceId) -> Result<InstanceState> {
        let full = cancellable(token, self.client.get(uuid))
            .await?
            .map_err(|e| ResourceError::remote(RemoteOperation::Get, Some(*uuid), e))?;

        let state = merge(MergeBase::Import, None, Some(&full))?;
        tracing::debug!(uuid = %uuid, "Read instance data source");
        Ok(state)
    }
}

/// The `kraftcloud_instances` data source.
pub struct InstancesDataSource<C: InstanceClient> {
    client: Arc<C>,
}

impl<C: InstanceClient> InstancesDataSource<C> {
    /// Create a new data source over `client`.
    #[must_use]
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// List all instances, sorted by name and then UUID.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Remote` if the list call fails.
    pub async fn read(&self, token: &CancellationToken) -> Result<Vec<InstanceSummary>> {
        let mut instances = cancellable(token, self.client.list())
            .await?
            .map_err(|e| ResourceError::remote(RemoteOperation::List, None, e))?;

        instances.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.uuid.cmp(&b.uuid)));
        tracing::debug!(count = instances.len(), "Read instances data source");
        Ok(instances)
    }
}
