//! Client contract for the KraftCloud instances API.
//!
//! The reconciliation engine in `kraftcloud-resource` only ever talks to the
//! remote control plane through the [`InstanceClient`] trait defined here.
//! This crate provides:
//!
//! - **Wire types**: the create payload and the partial/full instance records
//!   returned by the API
//! - **[`HttpInstanceClient`]**: the REST implementation over `reqwest`
//! - **[`ProviderConfig`]**: endpoint and credential resolution, the only
//!   place that reads `KRAFTCLOUD_*` environment variables
//! - **`MockInstanceClient`**: an in-memory implementation for tests
//!   (behind the `test-utils` feature)
//!
//! # Example
//!
//! ```no_run
//! use kraftcloud_client::{HttpInstanceClient, InstanceClient, ProviderConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProviderConfig::default().resolve()?;
//! let client = HttpInstanceClient::new(config)?;
//!
//! for summary in client.list().await? {
//!     println!("{} {:?}", summary.uuid, summary.name);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use client::InstanceClient;
pub use config::{ClientConfig, ConfigError, ProviderConfig};
pub use error::{ClientError, Result};
pub use http::HttpInstanceClient;
pub use types::{
    CreateInstancePayload, CreatedInstance, Handler, Instance, InstanceStatus, InstanceSummary,
    NetworkInterface, ServiceGroupPayload, ServiceGroupRef, ServicePayload,
};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockInstanceClient, Operation, RemoteCall};

pub use kraftcloud_core::{IdError, InstanceId, InterfaceId, ServiceGroupId};
