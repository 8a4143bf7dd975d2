//! In-memory instance client for tests.
//!
//! Behaves like the control plane closely enough for reconciliation tests:
//! identifiers are assigned on create, image tags are rewritten to digests,
//! and the full record omits the service list. Failures can be injected per
//! operation and every call is recorded.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use kraftcloud_core::{InstanceId, InterfaceId, ServiceGroupId};
use parking_lot::Mutex;

use crate::client::InstanceClient;
use crate::error::{ClientError, Result};
use crate::types::{
    CreateInstancePayload, CreatedInstance, Instance, InstanceStatus, InstanceSummary,
    NetworkInterface, ServiceGroupRef,
};

/// Remote operation kinds, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `create`
    Create,
    /// `get`
    Get,
    /// `list`
    List,
    /// `delete`
    Delete,
}

/// A recorded call against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `create` with the image sent.
    Create(String),
    /// `get` for an instance.
    Get(InstanceId),
    /// `list`
    List,
    /// `delete` for an instance.
    Delete(InstanceId),
}

/// Mock instance client.
#[derive(Default)]
pub struct MockInstanceClient {
    instances: Mutex<HashMap<InstanceId, Instance>>,
    failures: Mutex<HashMap<Operation, VecDeque<ClientError>>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl MockInstanceClient {
    /// Create a new mock client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `operation` fail with `error`.
    ///
    /// Queued failures are consumed in order.
    pub fn fail_next(&self, operation: Operation, error: ClientError) {
        self.failures
            .lock()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Insert or replace an instance record directly.
    pub fn insert(&self, instance: Instance) {
        self.instances.lock().insert(instance.uuid, instance);
    }

    /// Remove an instance out of band, as if deleted by someone else.
    pub fn remove(&self, uuid: &InstanceId) -> Option<Instance> {
        self.instances.lock().remove(uuid)
    }

    /// Modify a stored record in place.
    pub fn update<F: FnOnce(&mut Instance)>(&self, uuid: &InstanceId, f: F) {
        if let Some(instance) = self.instances.lock().get_mut(uuid) {
            f(instance);
        }
    }

    /// Get a stored record.
    #[must_use]
    pub fn stored(&self, uuid: &InstanceId) -> Option<Instance> {
        self.instances.lock().get(uuid).cloned()
    }

    /// Get the number of stored instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }

    /// Get every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    fn enter(&self, operation: Operation, call: RemoteCall) -> Result<()> {
        self.calls.lock().push(call);
        match self
            .failures
            .lock()
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Rewrite `repo:tag` to `repo@sha256:<digest>`, as the registry would.
fn resolve_digest(image: &str) -> String {
    if image.contains("@sha256:") {
        return image.to_string();
    }
    let repo = match image.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => repo,
        _ => image,
    };

    // FNV-1a, widened to 256 bits by reseeding.
    let mut digest = String::with_capacity(64);
    let mut seed: u64 = 0xcbf2_9ce4_8422_2325;
    for _ in 0..4 {
        let mut hash = seed;
        for byte in image.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        digest.push_str(&format!("{hash:016x}"));
        seed = hash.rotate_left(17);
    }
    format!("{repo}@sha256:{digest}")
}

fn short_name(image: &str) -> String {
    let base = image
        .split(['@', ':'])
        .next()
        .unwrap_or(image)
        .rsplit('/')
        .next()
        .unwrap_or(image);
    if base.is_empty() {
        "instance".to_string()
    } else {
        base.to_string()
    }
}

#[async_trait]
impl InstanceClient for MockInstanceClient {
    async fn create(&self, payload: &CreateInstancePayload) -> Result<CreatedInstance> {
        self.enter(Operation::Create, RemoteCall::Create(payload.image.clone()))?;

        let uuid = InstanceId::generate();
        let suffix: String = uuid.to_string().chars().take(8).collect();
        let name = format!("{}-{suffix}", short_name(&payload.image));
        let octet = self.instances.lock().len() % 250 + 2;
        let private_ip = format!("10.0.0.{octet}");
        let private_fqdn = format!("{name}.internal");

        let service_group = payload.service_group.as_ref().map(|_| ServiceGroupRef {
            uuid: Some(ServiceGroupId::generate()),
            name: Some(format!("{name}-svc")),
        });
        let fqdn = service_group
            .as_ref()
            .map(|_| format!("{name}.fra0.kraft.host"));

        let mut env = BTreeMap::new();
        env.insert("PATH".to_string(), "/usr/local/bin:/usr/bin:/bin".to_string());

        let instance = Instance {
            uuid,
            name: Some(name.clone()),
            created_at: Some(Utc::now()),
            state: Some(if payload.autostart == Some(false) {
                InstanceStatus::Stopped
            } else {
                InstanceStatus::Running
            }),
            image: Some(resolve_digest(&payload.image)),
            memory_mb: Some(payload.memory_mb),
            args: Some(payload.args.clone()),
            env: Some(env),
            fqdn: fqdn.clone(),
            private_fqdn: Some(private_fqdn.clone()),
            private_ip: Some(private_ip.clone()),
            service_group,
            network_interfaces: Some(vec![NetworkInterface {
                uuid: InterfaceId::generate(),
                name: None,
                private_ip: Some(private_ip.clone()),
                mac: Some(format!("02:00:0a:00:00:{octet:02x}")),
            }]),
            boot_time_us: Some(15_321),
        };

        self.instances.lock().insert(uuid, instance);

        Ok(CreatedInstance {
            uuid,
            name: Some(name),
            fqdn,
            private_ip: Some(private_ip),
            private_fqdn: Some(private_fqdn),
        })
    }

    async fn get(&self, uuid: &InstanceId) -> Result<Instance> {
        self.enter(Operation::Get, RemoteCall::Get(*uuid))?;
        self.instances
            .lock()
            .get(uuid)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(uuid.to_string()))
    }

    async fn list(&self) -> Result<Vec<InstanceSummary>> {
        self.enter(Operation::List, RemoteCall::List)?;
        Ok(self
            .instances
            .lock()
            .values()
            .map(|i| InstanceSummary {
                uuid: i.uuid,
                name: i.name.clone(),
            })
            .collect())
    }

    async fn delete(&self, uuid: &InstanceId) -> Result<()> {
        self.enter(Operation::Delete, RemoteCall::Delete(*uuid))?;
        self.instances
            .lock()
            .remove(uuid)
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(uuid.to_string()))
    }
}
