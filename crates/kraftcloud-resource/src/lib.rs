//! Reconciliation engine for the KraftCloud instance resource.
//!
//! This crate decides which remote calls each lifecycle operation makes,
//! fills in the defaults the API cannot, classifies every configuration
//! change as replacement-triggering or not, and merges partial and full API
//! responses into the state record the host persists.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Host orchestrator (plan/apply)              │
//! └─────────────────────────────────────────────────────────────┘
//!          │ schema                     │ create/read/delete/import
//!          ▼                            ▼
//! ┌──────────────────┐   ┌──────────────────────────────────────┐
//! │  schema          │   │           InstanceResource            │
//! │  ┌────────────┐  │   │  ┌───────────┐ ┌─────────┐ ┌───────┐ │
//! │  │ policy     │◀─┼───┼──│ defaults  │ │lifecycle│ │ merge │ │
//! │  │ table      │  │   │  └───────────┘ └─────────┘ └───────┘ │
//! │  └────────────┘  │   └──────────────────────────────────────┘
//! └──────────────────┘                    │
//!                                         ▼
//!                              ┌─────────────────────┐
//!                              │   InstanceClient    │
//!                              │ (HTTP API or mock)  │
//!                              └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use kraftcloud_client::{HttpInstanceClient, ProviderConfig};
//! use kraftcloud_resource::{InstanceConfig, InstanceLifecycle, InstanceResource};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpInstanceClient::new(ProviderConfig::default().resolve()?)?;
//! let resource = InstanceResource::new(Arc::new(client));
//! let token = CancellationToken::new();
//!
//! let config = InstanceConfig::new("nginx:latest").with_port(443);
//! let state = resource.create(&token, &config).await?;
//! println!("Created instance: {}", state.uuid);
//!
//! resource.delete(&token, &state.uuid).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Lifecycle
//!
//! - `Absent` → `Creating` → `ReadingFull` → `Present` (create)
//! - `Present` → `Reading` → `Present`, or `Absent` if removed (read)
//! - `Present` → `Deleting` → `Absent` (delete)
//! - `Absent` → `Reading` → `Present` (import)
//!
//! There is no update path; see the [`policy`] module.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod datasource;
pub mod defaults;
pub mod error;
pub mod lifecycle;
pub mod merge;
pub mod policy;
pub mod resource;
pub mod schema;
pub mod state;

pub use datasource::{InstanceDataSource, InstancesDataSource};
pub use error::{MergeError, RemoteOperation, ResourceError, Result, ValidationError};
pub use lifecycle::Phase;
pub use merge::{merge, MergeBase};
pub use policy::{classify, Attribute, Plan, Replacement, REPLACEMENT_POLICY};
pub use resource::{InstanceLifecycle, InstanceResource, ReadOutcome};
pub use schema::{
    instance_data_source_schema, instance_schema, instances_data_source_schema, ResourceSchema,
};
pub use state::{
    InstanceConfig, InstanceState, NetworkInterfaceState, ResolvedConfig, ServiceConfig,
    ServiceGroupConfig, ServiceGroupState, ServiceState,
};

// Re-export commonly used types from dependencies for convenience
pub use kraftcloud_core::{InstanceId, InterfaceId, ServiceGroupId};
