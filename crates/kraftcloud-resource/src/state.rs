//! Desired configuration and persisted state records.
//!
//! [`InstanceConfig`] is what the author wrote, with unset values as `None`.
//! [`ResolvedConfig`] is the same configuration after defaulting, ready to
//! be submitted. [`InstanceState`] is the record the host persists between
//! operations.
//!
//! Maps and sets are ordered containers so that serializing the same record
//! twice yields identical bytes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use kraftcloud_client::{
    CreateInstancePayload, Handler, InstanceId, InstanceStatus, InterfaceId, ServiceGroupId,
    ServiceGroupPayload, ServicePayload,
};
use serde::{Deserialize, Serialize};

/// Desired configuration of an instance.
///
/// Integer fields are signed so that out-of-range author input reaches
/// validation instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Image reference.
    pub image: String,
    /// Startup arguments.
    #[serde(default)]
    pub args: Option<Vec<String>>,
    /// Memory in megabytes; unset or zero means the default.
    #[serde(default)]
    pub memory_mb: Option<i64>,
    /// Whether the instance starts on incoming traffic.
    #[serde(default)]
    pub autostart: Option<bool>,
    /// Services to publish.
    #[serde(default)]
    pub service_group: Option<ServiceGroupConfig>,
}

impl InstanceConfig {
    /// Create a configuration for `image` with every other field unset.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    /// Publish a single service on `port`.
    #[must_use]
    pub fn with_port(mut self, port: i64) -> Self {
        self.service_group
            .get_or_insert_with(ServiceGroupConfig::default)
            .services
            .push(ServiceConfig::new(port));
        self
    }
}

/// Desired service group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceGroupConfig {
    /// Services, in configuration order.
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

/// Desired service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Public port.
    pub port: i64,
    /// Port inside the instance; defaults to `port`.
    #[serde(default)]
    pub destination_port: Option<i64>,
    /// Handler names; default to `tls`.
    #[serde(default)]
    pub handlers: Option<BTreeSet<String>>,
}

impl ServiceConfig {
    /// A service on `port` with defaults for everything else.
    #[must_use]
    pub const fn new(port: i64) -> Self {
        Self {
            port,
            destination_port: None,
            handlers: None,
        }
    }
}

/// Configuration after defaulting and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Image reference, as written.
    pub image: String,
    /// Startup arguments, as written.
    pub args: Option<Vec<String>>,
    /// Memory in megabytes.
    pub memory_mb: u32,
    /// Autostart flag, as written.
    pub autostart: Option<bool>,
    /// Resolved services, if a service group was configured.
    pub services: Option<Vec<ServiceState>>,
}

impl ResolvedConfig {
    /// Build the create payload.
    #[must_use]
    pub fn to_payload(&self) -> CreateInstancePayload {
        CreateInstancePayload {
            image: self.image.clone(),
            args: self.args.clone().unwrap_or_default(),
            memory_mb: self.memory_mb,
            service_group: self.services.as_ref().map(|services| ServiceGroupPayload {
                services: services
                    .iter()
                    .map(|s| ServicePayload {
                        port: s.port,
                        destination_port: s.destination_port,
                        handlers: s.handlers.iter().copied().collect(),
                    })
                    .collect(),
            }),
            autostart: self.autostart,
        }
    }
}

/// Persisted state of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    /// Server-assigned identifier.
    pub uuid: InstanceId,

    /// Image reference as configured; never the server's resolved form.
    pub image: String,
    /// Startup arguments.
    pub args: Option<Vec<String>>,
    /// Memory in megabytes, as reported by the server.
    pub memory_mb: Option<u32>,
    /// Autostart flag.
    pub autostart: Option<bool>,
    /// Attached service group.
    pub service_group: Option<ServiceGroupState>,

    /// Name.
    pub name: Option<String>,
    /// Public FQDN.
    pub fqdn: Option<String>,
    /// Private FQDN.
    pub private_fqdn: Option<String>,
    /// Private IPv4 address.
    pub private_ip: Option<String>,
    /// Lifecycle state.
    pub state: Option<InstanceStatus>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Environment variables.
    pub env: Option<BTreeMap<String, String>>,
    /// Duration of the last boot in microseconds.
    pub boot_time_us: Option<u64>,
    /// Network interfaces, in server order.
    pub network_interfaces: Option<Vec<NetworkInterfaceState>>,
}

/// Service group projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceGroupState {
    /// Identifier.
    pub uuid: Option<ServiceGroupId>,
    /// Name.
    pub name: Option<String>,
    /// Services as configured. The API does not return them, so they are
    /// unknown after an import.
    pub services: Option<Vec<ServiceState>>,
}

/// Resolved service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    /// Public port.
    pub port: u16,
    /// Port inside the instance.
    pub destination_port: u16,
    /// Protocol handlers.
    pub handlers: BTreeSet<Handler>,
}

/// Network interface projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceState {
    /// Identifier.
    pub uuid: InterfaceId,
    /// Name, synthesized when the server omits it.
    pub name: String,
    /// Private IPv4 address.
    pub private_ip: Option<String>,
    /// MAC address.
    pub mac: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_port_appends_services() {
        let config = InstanceConfig::new("nginx:latest").with_port(443).with_port(80);
        let services = config.service_group.unwrap().services;
        assert_eq!(services.len(), 2);
        assert_eq!(services[1], ServiceConfig::new(80));
    }

    #[test]
    fn payload_carries_resolved_services() {
        let resolved = ResolvedConfig {
            image: "nginx:latest".into(),
            args: None,
            memory_mb: 128,
            autostart: Some(true),
            services: Some(vec![ServiceState {
                port: 443,
                destination_port: 8080,
                handlers: [Handler::Tls, Handler::Http].into_iter().collect(),
            }]),
        };

        let payload = resolved.to_payload();
        assert!(payload.args.is_empty());
        assert_eq!(payload.autostart, Some(true));
        let service = &payload.service_group.unwrap().services[0];
        assert_eq!(service.destination_port, 8080);
        assert_eq!(service.handlers, vec![Handler::Tls, Handler::Http]);
    }

    #[test]
    fn config_deserializes_with_unset_fields() {
        let config: InstanceConfig = serde_json::from_value(serde_json::json!({
            "image": "nginx:latest",
            "service_group": {"services": [{"port": 443}]}
        }))
        .unwrap();

        assert!(config.memory_mb.is_none());
        assert_eq!(
            config.service_group.unwrap().services,
            vec![ServiceConfig::new(443)]
        );
    }
}
