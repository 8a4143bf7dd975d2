//! Merging API responses into the state record.
//!
//! A state record is built from up to three sources, in precedence order:
//!
//! 1. the full record from a status fetch,
//! 2. the partial record from the create call,
//! 3. the base: the resolved configuration on create, the prior state on
//!    read, nothing on import.
//!
//! Observed fields take the first source that has a value and are `None`
//! otherwise. The instance name alone also falls back to the prior state,
//! since synthesized interface names depend on it.
//!
//! The image is always taken from the base so the server's digest-resolved
//! form never replaces what the author wrote; only an import, which has no
//! base, takes the server's value.

use kraftcloud_client::{CreatedInstance, Instance, InstanceId, NetworkInterface};

use crate::error::MergeError;
use crate::state::{
    InstanceState, NetworkInterfaceState, ResolvedConfig, ServiceGroupState, ServiceState,
};

/// The record the API responses are merged onto.
#[derive(Debug, Clone, Copy)]
pub enum MergeBase<'a> {
    /// First record after a create.
    Desired(&'a ResolvedConfig),
    /// Refresh of an existing record.
    Prior(&'a InstanceState),
    /// Import without prior state.
    Import,
}

struct BaseValues<'a> {
    uuid: Option<InstanceId>,
    name: Option<&'a str>,
    image: Option<&'a str>,
    args: Option<&'a Vec<String>>,
    memory_mb: Option<u32>,
    autostart: Option<bool>,
    services: Option<&'a Vec<ServiceState>>,
}

impl<'a> MergeBase<'a> {
    fn values(self) -> BaseValues<'a> {
        match self {
            Self::Desired(config) => BaseValues {
                uuid: None,
                name: None,
                image: Some(&config.image),
                args: config.args.as_ref(),
                memory_mb: Some(config.memory_mb),
                autostart: config.autostart,
                services: config.services.as_ref(),
            },
            Self::Prior(state) => BaseValues {
                uuid: Some(state.uuid),
                name: state.name.as_deref(),
                image: Some(&state.image),
                args: state.args.as_ref(),
                memory_mb: state.memory_mb,
                autostart: state.autostart,
                services: state
                    .service_group
                    .as_ref()
                    .and_then(|g| g.services.as_ref()),
            },
            Self::Import => BaseValues {
                uuid: None,
                name: None,
                image: None,
                args: None,
                memory_mb: None,
                autostart: None,
                services: None,
            },
        }
    }
}

/// Merge `partial` and `full` onto `base`.
///
/// # Errors
///
/// Returns `MergeError::UuidMismatch` if the sources name different
/// instances, and `MergeError::MissingField` if no source provides the
/// identifier or the image.
pub fn merge(
    base: MergeBase<'_>,
    partial: Option<&CreatedInstance>,
    full: Option<&Instance>,
) -> Result<InstanceState, MergeError> {
    let base_values = base.values();

    let mut uuid = base_values.uuid;
    for candidate in [partial.map(|p| p.uuid), full.map(|f| f.uuid)]
        .into_iter()
        .flatten()
    {
        match uuid {
            Some(expected) if expected != candidate => {
                return Err(MergeError::UuidMismatch {
                    expected,
                    actual: candidate,
                });
            }
            _ => uuid = Some(candidate),
        }
    }
    let uuid = uuid.ok_or(MergeError::MissingField("uuid"))?;

    let image = match base {
        MergeBase::Import => full.and_then(|f| f.image.clone()),
        _ => base_values.image.map(str::to_string),
    }
    .ok_or(MergeError::MissingField("image"))?;

    // The API reports no arguments as an empty list.
    let args = full
        .and_then(|f| f.args.clone())
        .filter(|a| !a.is_empty())
        .or_else(|| base_values.args.cloned());

    let observed = |from_full: Option<String>, from_partial: Option<String>| from_full.or(from_partial);

    // Interface names are derived from the instance name, so a status fetch
    // that omits it must not rename them.
    let name = observed(
        full.and_then(|f| f.name.clone()),
        partial.and_then(|p| p.name.clone()),
    )
    .or_else(|| base_values.name.map(str::to_string));

    let service_group = merge_service_group(base, full, base_values.services);
    let network_interfaces = full
        .and_then(|f| f.network_interfaces.as_ref())
        .map(|ifaces| project_interfaces(name.as_deref(), ifaces));

    let state = InstanceState {
        uuid,
        image,
        args,
        memory_mb: full.and_then(|f| f.memory_mb).or(base_values.memory_mb),
        autostart: base_values.autostart,
        service_group,
        fqdn: observed(
            full.and_then(|f| f.fqdn.clone()),
            partial.and_then(|p| p.fqdn.clone()),
        ),
        private_fqdn: observed(
            full.and_then(|f| f.private_fqdn.clone()),
            partial.and_then(|p| p.private_fqdn.clone()),
        ),
        private_ip: observed(
            full.and_then(|f| f.private_ip.clone()),
            partial.and_then(|p| p.private_ip.clone()),
        ),
        name,
        state: full.and_then(|f| f.state),
        created_at: full.and_then(|f| f.created_at),
        env: full.and_then(|f| f.env.clone()),
        boot_time_us: full.and_then(|f| f.boot_time_us),
        network_interfaces,
    };

    tracing::debug!(
        uuid = %state.uuid,
        has_partial = partial.is_some(),
        has_full = full.is_some(),
        "Merged instance state"
    );

    Ok(state)
}

fn merge_service_group(
    base: MergeBase<'_>,
    full: Option<&Instance>,
    services: Option<&Vec<ServiceState>>,
) -> Option<ServiceGroupState> {
    let prior_group = match base {
        MergeBase::Prior(state) => state.service_group.as_ref(),
        _ => None,
    };
    let remote = full.and_then(|f| f.service_group.as_ref());

    if remote.is_none() && services.is_none() && prior_group.is_none() {
        return None;
    }

    // Without a full record the group identity is unknown; keep what the
    // prior state recorded.
    let (uuid, name) = match (full, remote) {
        (Some(_), Some(r)) => (r.uuid, r.name.clone()),
        (Some(_), None) => (None, None),
        (None, _) => prior_group.map_or((None, None), |g| (g.uuid, g.name.clone())),
    };

    Some(ServiceGroupState {
        uuid,
        name,
        services: services.cloned(),
    })
}

/// Name used for an interface the API returned without one.
///
/// Derived from the instance name and the interface position so it stays
/// the same across reads; falls back to the interface UUID while the
/// instance name is unknown.
#[must_use]
pub fn interface_name(instance_name: Option<&str>, index: usize, iface: &NetworkInterface) -> String {
    match (&iface.name, instance_name) {
        (Some(name), _) if !name.is_empty() => name.clone(),
        (_, Some(instance)) if !instance.is_empty() => format!("{instance}-eth{index}"),
        _ => iface.uuid.to_string(),
    }
}

fn project_interfaces(
    instance_name: Option<&str>,
    ifaces: &[NetworkInterface],
) -> Vec<NetworkInterfaceState> {
    ifaces
        .iter()
        .enumerate()
        .map(|(i, iface)| NetworkInterfaceState {
            uuid: iface.uuid,
            name: interface_name(instance_name, i, iface),
            private_ip: iface.private_ip.clone(),
            mac: iface.mac.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults;
    use crate::state::InstanceConfig;
    use kraftcloud_client::{InstanceStatus, InterfaceId, ServiceGroupId, ServiceGroupRef};
    use std::collections::BTreeMap;

    fn resolved() -> ResolvedConfig {
        defaults::resolve(&InstanceConfig::new("repo/nginx:latest").with_port(80)).unwrap()
    }

    fn partial(uuid: InstanceId) -> CreatedInstance {
        CreatedInstance {
            uuid,
            name: Some("nginx-1".into()),
            fqdn: Some("x.cloud".into()),
            private_ip: Some("10.0.0.2".into()),
            private_fqdn: None,
        }
    }

    fn full(uuid: InstanceId) -> Instance {
        Instance {
            name: Some("nginx-1".into()),
            state: Some(InstanceStatus::Running),
            image: Some("repo/nginx@sha256:0123".into()),
            memory_mb: Some(128),
            args: Some(Vec::new()),
            env: Some(BTreeMap::from([("PATH".into(), "/bin".into())])),
            private_fqdn: Some("nginx-1.internal".into()),
            private_ip: Some("10.0.0.2".into()),
            service_group: Some(ServiceGroupRef {
                uuid: Some(ServiceGroupId::generate()),
                name: Some("nginx-1-svc".into()),
            }),
            network_interfaces: Some(vec![NetworkInterface {
                uuid: InterfaceId::generate(),
                name: None,
                private_ip: Some("10.0.0.2".into()),
                mac: Some("02:00:0a:00:00:02".into()),
            }]),
            boot_time_us: Some(15_321),
            ..Instance::bare(uuid)
        }
    }

    #[test]
    fn create_merge_combines_both_fragments() {
        let uuid = InstanceId::generate();
        let config = resolved();
        let state = merge(
            MergeBase::Desired(&config),
            Some(&partial(uuid)),
            Some(&full(uuid)),
        )
        .unwrap();

        assert_eq!(state.uuid, uuid);
        assert_eq!(state.image, "repo/nginx:latest");
        assert_eq!(state.memory_mb, Some(128));
        assert_eq!(state.state, Some(InstanceStatus::Running));
        // fqdn only in the partial record
        assert_eq!(state.fqdn.as_deref(), Some("x.cloud"));
        // private_fqdn only in the full record
        assert_eq!(state.private_fqdn.as_deref(), Some("nginx-1.internal"));
        assert_eq!(state.args, None);

        let group = state.service_group.unwrap();
        assert_eq!(group.name.as_deref(), Some("nginx-1-svc"));
        assert_eq!(group.services, config.services);
    }

    #[test]
    fn partial_only_leaves_observed_fields_unset() {
        let uuid = InstanceId::generate();
        let config = resolved();
        let state = merge(MergeBase::Desired(&config), Some(&partial(uuid)), None).unwrap();

        assert_eq!(state.uuid, uuid);
        assert_eq!(state.memory_mb, Some(128));
        assert_eq!(state.state, None);
        assert_eq!(state.env, None);
        assert_eq!(state.network_interfaces, None);
    }

    #[test]
    fn read_preserves_prior_image_and_services() {
        let uuid = InstanceId::generate();
        let config = resolved();
        let prior = merge(MergeBase::Desired(&config), Some(&partial(uuid)), Some(&full(uuid))).unwrap();

        let mut refreshed = full(uuid);
        refreshed.image = Some("repo/nginx@sha256:ffff".into());
        refreshed.state = Some(InstanceStatus::Stopped);

        let state = merge(MergeBase::Prior(&prior), None, Some(&refreshed)).unwrap();
        assert_eq!(state.image, "repo/nginx:latest");
        assert_eq!(state.state, Some(InstanceStatus::Stopped));
        assert_eq!(state.fqdn, None);
        assert_eq!(
            state.service_group.unwrap().services,
            prior.service_group.unwrap().services
        );
    }

    #[test]
    fn import_takes_server_image() {
        let uuid = InstanceId::generate();
        let state = merge(MergeBase::Import, None, Some(&full(uuid))).unwrap();

        assert_eq!(state.image, "repo/nginx@sha256:0123");
        assert_eq!(state.autostart, None);
        assert_eq!(state.service_group.unwrap().services, None);
    }

    #[test]
    fn import_without_image_fails() {
        let uuid = InstanceId::generate();
        let result = merge(MergeBase::Import, None, Some(&Instance::bare(uuid)));
        assert_eq!(result, Err(MergeError::MissingField("image")));
    }

    #[test]
    fn mismatched_uuids_are_rejected() {
        let config = resolved();
        let a = InstanceId::generate();
        let b = InstanceId::generate();
        let result = merge(MergeBase::Desired(&config), Some(&partial(a)), Some(&full(b)));
        assert_eq!(
            result,
            Err(MergeError::UuidMismatch {
                expected: a,
                actual: b
            })
        );
    }

    #[test]
    fn server_args_win_when_present() {
        let uuid = InstanceId::generate();
        let config = resolved();
        let mut record = full(uuid);
        record.args = Some(vec!["-g".into()]);

        let state = merge(MergeBase::Desired(&config), None, Some(&record)).unwrap();
        assert_eq!(state.args, Some(vec!["-g".to_string()]));
    }

    #[test]
    fn read_without_name_keeps_interface_names() {
        let uuid = InstanceId::generate();
        let config = resolved();
        let prior = merge(MergeBase::Desired(&config), Some(&partial(uuid)), Some(&full(uuid))).unwrap();

        let mut unnamed = full(uuid);
        unnamed.name = None;

        let state = merge(MergeBase::Prior(&prior), None, Some(&unnamed)).unwrap();
        assert_eq!(state.name.as_deref(), Some("nginx-1"));
        assert_eq!(state.network_interfaces, prior.network_interfaces);
        assert_eq!(state.network_interfaces.unwrap()[0].name, "nginx-1-eth0");
    }

    #[test]
    fn interface_names_are_stable() {
        let iface = NetworkInterface {
            uuid: InterfaceId::generate(),
            name: None,
            private_ip: None,
            mac: None,
        };

        assert_eq!(interface_name(Some("nginx-1"), 0, &iface), "nginx-1-eth0");
        assert_eq!(interface_name(None, 0, &iface), iface.uuid.to_string());

        let named = NetworkInterface {
            name: Some("uplink".into()),
            ..iface
        };
        assert_eq!(interface_name(Some("nginx-1"), 3, &named), "uplink");
    }

    #[test]
    fn repeated_merges_serialize_identically() {
        let uuid = InstanceId::generate();
        let config = resolved();
        let prior = merge(MergeBase::Desired(&config), Some(&partial(uuid)), Some(&full(uuid))).unwrap();
        let record = full(uuid);

        let first = merge(MergeBase::Prior(&prior), None, Some(&record)).unwrap();
        let second = merge(MergeBase::Prior(&first), None, Some(&record)).unwrap();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}
