//! Request and response types for the instances API.
//!
//! These types mirror the JSON documents exchanged with the control plane.
//! Every response field except the UUID is optional: the API omits fields it
//! has no value for, and the create call omits most fields on purpose.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use kraftcloud_core::{InstanceId, InterfaceId, ServiceGroupId};
use serde::{Deserialize, Serialize};

/// Protocol handler applied to a published service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handler {
    /// TLS termination.
    Tls,
    /// HTTP parsing.
    Http,
    /// Redirect plain HTTP to HTTPS.
    Redirect,
}

impl Handler {
    /// All handlers accepted by the API.
    pub const ALL: [Self; 3] = [Self::Tls, Self::Http, Self::Redirect];

    /// The wire name of the handler.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tls => "tls",
            Self::Http => "http",
            Self::Redirect => "redirect",
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Handler {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Lifecycle state reported for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Not running.
    Stopped,
    /// Booting.
    Starting,
    /// Running and reachable.
    Running,
    /// Finishing in-flight connections before stopping.
    Draining,
    /// Shutting down.
    Stopping,
}

impl InstanceStatus {
    /// All states reported by the API.
    pub const ALL: [Self; 5] = [
        Self::Stopped,
        Self::Starting,
        Self::Running,
        Self::Draining,
        Self::Stopping,
    ];

    /// The wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `POST /v1/instances`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInstancePayload {
    /// Image reference, possibly a tag that the API resolves to a digest.
    pub image: String,
    /// Startup arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Memory in megabytes. Always sent: the API rejects zero.
    pub memory_mb: u32,
    /// Services to publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_group: Option<ServiceGroupPayload>,
    /// Whether the instance starts on incoming traffic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autostart: Option<bool>,
}

/// Service group embedded in a create payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceGroupPayload {
    /// Published services, in configuration order.
    pub services: Vec<ServicePayload>,
}

/// One published port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePayload {
    /// Public port.
    pub port: u16,
    /// Port inside the instance.
    pub destination_port: u16,
    /// Protocol handlers.
    pub handlers: Vec<Handler>,
}

/// Partial record returned by the create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedInstance {
    /// Assigned identifier.
    pub uuid: InstanceId,
    /// Assigned name.
    #[serde(default)]
    pub name: Option<String>,
    /// Public FQDN, when a service group was published.
    #[serde(default)]
    pub fqdn: Option<String>,
    /// Private IPv4 address.
    #[serde(default)]
    pub private_ip: Option<String>,
    /// Private FQDN.
    #[serde(default)]
    pub private_fqdn: Option<String>,
}

/// Full record returned by `GET /v1/instances/{uuid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Identifier.
    pub uuid: InstanceId,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Current lifecycle state.
    #[serde(default)]
    pub state: Option<InstanceStatus>,
    /// Image reference as resolved by the API.
    #[serde(default)]
    pub image: Option<String>,
    /// Memory in megabytes.
    #[serde(default)]
    pub memory_mb: Option<u32>,
    /// Startup arguments.
    #[serde(default)]
    pub args: Option<Vec<String>>,
    /// Environment variables.
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
    /// Public FQDN.
    #[serde(default)]
    pub fqdn: Option<String>,
    /// Private FQDN.
    #[serde(default)]
    pub private_fqdn: Option<String>,
    /// Private IPv4 address.
    #[serde(default)]
    pub private_ip: Option<String>,
    /// Attached service group. Its services are not included.
    #[serde(default)]
    pub service_group: Option<ServiceGroupRef>,
    /// Attached network interfaces.
    #[serde(default)]
    pub network_interfaces: Option<Vec<NetworkInterface>>,
    /// Time the last boot took, in microseconds.
    #[serde(default)]
    pub boot_time_us: Option<u64>,
}

impl Instance {
    /// An instance record carrying only its identifier.
    #[must_use]
    pub fn bare(uuid: InstanceId) -> Self {
        Self {
            uuid,
            name: None,
            created_at: None,
            state: None,
            image: None,
            memory_mb: None,
            args: None,
            env: None,
            fqdn: None,
            private_fqdn: None,
            private_ip: None,
            service_group: None,
            network_interfaces: None,
            boot_time_us: None,
        }
    }
}

/// Reference to the service group attached to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceGroupRef {
    /// Identifier.
    #[serde(default)]
    pub uuid: Option<ServiceGroupId>,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Network interface attached to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Identifier.
    pub uuid: InterfaceId,
    /// Name; not always returned.
    #[serde(default)]
    pub name: Option<String>,
    /// Private IPv4 address.
    #[serde(default)]
    pub private_ip: Option<String>,
    /// MAC address.
    #[serde(default)]
    pub mac: Option<String>,
}

/// Entry returned by `GET /v1/instances`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSummary {
    /// Identifier.
    pub uuid: InstanceId,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_names() {
        assert_eq!("tls".parse::<Handler>(), Ok(Handler::Tls));
        assert_eq!("redirect".parse::<Handler>(), Ok(Handler::Redirect));
        assert_eq!("TLS".parse::<Handler>(), Err("TLS".to_string()));
        assert_eq!(Handler::Http.to_string(), "http");
    }

    #[test]
    fn payload_omits_unset_fields() {
        let payload = CreateInstancePayload {
            image: "nginx:latest".to_string(),
            args: Vec::new(),
            memory_mb: 128,
            service_group: None,
            autostart: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"image": "nginx:latest", "memory_mb": 128})
        );
    }

    #[test]
    fn full_instance_tolerates_missing_fields() {
        let json = serde_json::json!({
            "uuid": "6c3a3f6e-6a8b-4d6e-9f52-0b3f1c1f7a11",
            "state": "draining",
            "memory_mb": 64,
            "network_interfaces": [
                {"uuid": "0d6c1ad4-7d52-4a89-9a3f-6e7a2d1f9b00", "mac": "02:00:00:00:00:01"}
            ]
        });

        let instance: Instance = serde_json::from_value(json).unwrap();
        assert_eq!(instance.state, Some(InstanceStatus::Draining));
        assert_eq!(instance.memory_mb, Some(64));
        assert!(instance.fqdn.is_none());
        let ifaces = instance.network_interfaces.unwrap();
        assert_eq!(ifaces.len(), 1);
        assert!(ifaces[0].name.is_none());
    }

    #[test]
    fn unknown_state_is_rejected() {
        let json = serde_json::json!({
            "uuid": "6c3a3f6e-6a8b-4d6e-9f52-0b3f1c1f7a11",
            "state": "exploding"
        });
        assert!(serde_json::from_value::<Instance>(json).is_err());
    }
}
