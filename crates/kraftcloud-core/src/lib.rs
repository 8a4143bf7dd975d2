//! Core types for the KraftCloud instance provider.
//!
//! This crate provides the foundational types shared by the client and the
//! resource crates:
//!
//! - **Identifiers**: Strongly-typed UUIDs for instances, service groups and
//!   network interfaces
//! - **Error types**: [`IdError`] for identifiers that fail to parse
//!
//! # Example
//!
//! ```
//! use kraftcloud_core::InstanceId;
//!
//! let id: InstanceId = "6c3a3f6e-6a8b-4d6e-9f52-0b3f1c1f7a11".parse().unwrap();
//! assert_eq!(id.to_string(), "6c3a3f6e-6a8b-4d6e-9f52-0b3f1c1f7a11");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{IdError, InstanceId, InterfaceId, ServiceGroupId};
