//! Instance lifecycle orchestration.
//!
//! This module provides the `InstanceLifecycle` trait and the
//! `InstanceResource` implementation that drives the remote calls for each
//! lifecycle operation and merges the responses into a state record.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use kraftcloud_client::{ClientError, CreatedInstance, InstanceClient, InstanceId};
use tokio_util::sync::CancellationToken;

use crate::defaults;
use crate::error::{RemoteOperation, ResourceError, Result};
use crate::lifecycle::{Phase, Tracker};
use crate::merge::{merge, MergeBase};
use crate::policy::Plan;
use crate::state::{InstanceConfig, InstanceState, ResolvedConfig};

/// Result of refreshing a recorded instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The instance exists; here is its refreshed state.
    Found(InstanceState),
    /// The instance no longer exists remotely and should be dropped from
    /// state.
    Removed,
}

impl ReadOutcome {
    /// The refreshed state, if the instance still exists.
    #[must_use]
    pub fn into_state(self) -> Option<InstanceState> {
        match self {
            Self::Found(state) => Some(state),
            Self::Removed => None,
        }
    }
}

/// Lifecycle operations on a single instance.
///
/// Each operation takes the caller's cancellation token. A token cancelled
/// before a remote call means the call is not issued.
#[async_trait]
pub trait InstanceLifecycle: Send + Sync {
    /// Create an instance from `config`.
    ///
    /// Issues the create call, then a status fetch for the returned UUID,
    /// and merges both responses.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Validation` before any remote call if the
    /// configuration is invalid, `ResourceError::Remote` if the create call
    /// fails, `ResourceError::Cancelled` if the token fires before the create
    /// call returns, and `ResourceError::PartialCreate` if the instance was
    /// created but no complete state could be built for it.
    async fn create(&self, token: &CancellationToken, config: &InstanceConfig)
        -> Result<InstanceState>;

    /// Refresh a recorded instance.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Remote` for any failure other than the
    /// instance being absent, which is reported as `ReadOutcome::Removed`.
    async fn read(&self, token: &CancellationToken, prior: &InstanceState) -> Result<ReadOutcome>;

    /// Apply a configuration change in place.
    ///
    /// Instances cannot be changed in place, so this always fails.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Unsupported` listing the changed attributes.
    /// An invalid attribute in `config` is listed as changed.
    async fn update(
        &self,
        token: &CancellationToken,
        prior: &InstanceState,
        config: &InstanceConfig,
    ) -> Result<InstanceState>;

    /// Delete an instance. An already absent instance counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Remote` for any failure other than the
    /// instance being absent.
    async fn delete(&self, token: &CancellationToken, uuid: &InstanceId) -> Result<()>;

    /// Build a state record for an existing instance from its UUID.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::InvalidImportId` if `id` is not a UUID and
    /// `ResourceError::Remote` if the instance cannot be fetched.
    async fn import(&self, token: &CancellationToken, id: &str) -> Result<InstanceState>;
}

/// Run a remote call unless or until `token` is cancelled.
pub(crate) async fn cancellable<T, F>(
    token: &CancellationToken,
    call: F,
) -> Result<std::result::Result<T, ClientError>>
where
    F: Future<Output = std::result::Result<T, ClientError>> + Send,
{
    if token.is_cancelled() {
        return Err(ResourceError::Cancelled);
    }
    tokio::select! {
        biased;
        () = token.cancelled() => Err(ResourceError::Cancelled),
        result = call => Ok(result),
    }
}

/// The instance lifecycle implementation.
pub struct InstanceResource<C: InstanceClient> {
    client: Arc<C>,
}

impl<C: InstanceClient> InstanceResource<C> {
    /// Create a new instance resource over `client`.
    #[must_use]
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Get a reference to the client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Build the error for a create that did not yield a complete state.
    ///
    /// No compensating delete is issued: the instance may be healthy and
    /// only the fetch failed.
    fn partial_create(
        resolved: &ResolvedConfig,
        created: &CreatedInstance,
        source: ResourceError,
    ) -> ResourceError {
        let partial_state = match merge(MergeBase::Desired(resolved), Some(created), None) {
            Ok(state) => state,
            Err(e) => return ResourceError::Merge(e),
        };

        tracing::warn!(
            uuid = %created.uuid,
            error = %source,
            "Instance was created but its status could not be fetched; \
             it exists remotely and may need to be imported"
        );

        ResourceError::PartialCreate {
            uuid: created.uuid,
            partial_state: Box::new(partial_state),
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl<C: InstanceClient + 'static> InstanceLifecycle for InstanceResource<C> {
    async fn create(
        &self,
        token: &CancellationToken,
        config: &InstanceConfig,
    ) -> Result<InstanceState> {
        let resolved = defaults::resolve(config)?;
        let payload = resolved.to_payload();

        // Checked here so that a cancellation reported by the create call
        // below always means the request was already sent.
        if token.is_cancelled() {
            return Err(ResourceError::Cancelled);
        }

        let mut tracker = Tracker::new(Phase::Absent);
        tracker.advance(Phase::Creating)?;
        tracing::debug!(
            image = %payload.image,
            memory_mb = payload.memory_mb,
            "Creating instance"
        );

        let created = match cancellable(token, self.client.create(&payload)).await {
            Ok(result) => {
                result.map_err(|e| ResourceError::remote(RemoteOperation::Create, None, e))?
            }
            Err(e) => {
                tracing::warn!(
                    image = %payload.image,
                    "Create was cancelled after the request was sent; the instance may \
                     exist remotely, check with list and import it if so"
                );
                return Err(e);
            }
        };

        // The create response lacks memory, state, timestamps and
        // interfaces; fetch them with the UUID it returned.
        tracker.advance(Phase::ReadingFull)?;
        let full = match cancellable(token, self.client.get(&created.uuid)).await {
            Ok(Ok(full)) => full,
            Ok(Err(e)) => {
                let source = ResourceError::remote(RemoteOperation::Get, Some(created.uuid), e);
                return Err(Self::partial_create(&resolved, &created, source));
            }
            Err(e) => return Err(Self::partial_create(&resolved, &created, e)),
        };

        let state = match merge(MergeBase::Desired(&resolved), Some(&created), Some(&full)) {
            Ok(state) => state,
            Err(e) => {
                let source = ResourceError::Merge(e);
                return Err(Self::partial_create(&resolved, &created, source));
            }
        };
        tracker.advance(Phase::Present)?;

        tracing::info!(
            uuid = %state.uuid,
            name = state.name.as_deref().unwrap_or_default(),
            "Created instance"
        );

        Ok(state)
    }

    async fn read(&self, token: &CancellationToken, prior: &InstanceState) -> Result<ReadOutcome> {
        let mut tracker = Tracker::new(Phase::Present);
        tracker.advance(Phase::Reading)?;

        match cancellable(token, self.client.get(&prior.uuid)).await? {
            Ok(full) => {
                let state = merge(MergeBase::Prior(prior), None, Some(&full))?;
                tracker.advance(Phase::Present)?;
                tracing::debug!(uuid = %state.uuid, state = ?state.state, "Refreshed instance");
                Ok(ReadOutcome::Found(state))
            }
            Err(e) if e.is_not_found() => {
                tracker.advance(Phase::Absent)?;
                tracing::warn!(uuid = %prior.uuid, "Instance no longer exists, removing from state");
                Ok(ReadOutcome::Removed)
            }
            Err(e) => Err(ResourceError::remote(
                RemoteOperation::Get,
                Some(prior.uuid),
                e,
            )),
        }
    }

    async fn update(
        &self,
        _token: &CancellationToken,
        prior: &InstanceState,
        config: &InstanceConfig,
    ) -> Result<InstanceState> {
        // Reaching update is a host contract violation whatever the config
        // holds, so an invalid attribute is reported as changed.
        let changed = match Plan::compute(prior, config) {
            Ok(plan) => plan.changed_paths(),
            Err(invalid) => vec![invalid.attribute],
        };

        tracing::error!(
            uuid = %prior.uuid,
            changed = ?changed,
            "Update requested for an instance that only supports replacement"
        );

        Err(ResourceError::Unsupported { changed })
    }

    async fn delete(&self, token: &CancellationToken, uuid: &InstanceId) -> Result<()> {
        let mut tracker = Tracker::new(Phase::Present);
        tracker.advance(Phase::Deleting)?;

        let result = cancellable(token, self.client.delete(uuid)).await;
        if matches!(result, Err(ResourceError::Cancelled)) {
            tracing::debug!(uuid = %uuid, phase = ?tracker.phase(), "Delete cancelled");
        }

        match result? {
            Ok(()) => {
                tracker.advance(Phase::Absent)?;
                tracing::info!(uuid = %uuid, "Deleted instance");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracker.advance(Phase::Absent)?;
                tracing::warn!(uuid = %uuid, "Instance was already absent");
                Ok(())
            }
            Err(e) => {
                tracker.advance(Phase::Present)?;
                Err(ResourceError::remote(RemoteOperation::Delete, Some(*uuid), e))
            }
        }
    }

    async fn import(&self, token: &CancellationToken, id: &str) -> Result<InstanceState> {
        let uuid: InstanceId = id.parse()?;

        let mut tracker = Tracker::new(Phase::Absent);
        tracker.advance(Phase::Reading)?;

        let full = cancellable(token, self.client.get(&uuid))
            .await?
            .map_err(|e| ResourceError::remote(RemoteOperation::Get, Some(uuid), e))?;

        let state = merge(MergeBase::Import, None, Some(&full))?;
        tracker.advance(Phase::Present)?;

        tracing::info!(uuid = %uuid, "Imported instance");
        Ok(state)
    }
}
