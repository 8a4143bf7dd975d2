//! Replacement policy.
//!
//! Instances are immutable once booted: no attribute can be changed in
//! place. [`REPLACEMENT_POLICY`] assigns every attribute its classification
//! and is read both by the host schema ([`crate::schema`]) and by
//! [`Plan`], which [`InstanceResource::update`](crate::InstanceResource)
//! uses to report what should have triggered a replacement.
//!
//! ```text
//!   prior == new ───────────────────────────────▶ NoOp
//!   Computed attribute ─────────────────────────▶ NoOp
//!   ForceReplaceIfWasConfigured, new unset ─────▶ NoOp (prior value kept)
//!   otherwise ──────────────────────────────────▶ table entry
//! ```

use std::fmt;

use serde::Serialize;

use crate::defaults;
use crate::error::ValidationError;
use crate::state::{InstanceConfig, InstanceState};

/// Classification of a change to one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Replacement {
    /// Nothing to do.
    #[serde(rename = "none")]
    NoOp,
    /// The change can be applied to the running instance.
    #[serde(rename = "update_in_place")]
    UpdateInPlace,
    /// The instance must be destroyed and recreated.
    #[serde(rename = "requires_replace")]
    ForceReplace,
    /// Replacement is required when the new value is configured; an unset
    /// value keeps the prior one.
    #[serde(rename = "requires_replace_if_configured")]
    ForceReplaceIfWasConfigured,
}

impl Replacement {
    /// Returns true if this verdict destroys and recreates the instance.
    #[must_use]
    pub const fn requires_replace(self) -> bool {
        matches!(self, Self::ForceReplace | Self::ForceReplaceIfWasConfigured)
    }
}

/// Attributes of the instance resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    /// `image`
    Image,
    /// `args`
    Args,
    /// `memory_mb`
    MemoryMb,
    /// `autostart`
    Autostart,
    /// `service_group.services`
    Services,
    /// `service_group.services[].port`
    ServicePort,
    /// `service_group.services[].destination_port`
    DestinationPort,
    /// `service_group.services[].handlers`
    Handlers,
    /// `uuid`
    Uuid,
    /// `name`
    Name,
    /// `fqdn`
    Fqdn,
    /// `private_fqdn`
    PrivateFqdn,
    /// `private_ip`
    PrivateIp,
    /// `state`
    State,
    /// `created_at`
    CreatedAt,
    /// `env`
    Env,
    /// `boot_time_us`
    BootTimeUs,
    /// `network_interfaces`
    NetworkInterfaces,
    /// `service_group.uuid`
    ServiceGroupUuid,
    /// `service_group.name`
    ServiceGroupName,
}

impl Attribute {
    /// Attribute path in the schema.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Args => "args",
            Self::MemoryMb => "memory_mb",
            Self::Autostart => "autostart",
            Self::Services => "service_group.services",
            Self::ServicePort => "service_group.services.port",
            Self::DestinationPort => "service_group.services.destination_port",
            Self::Handlers => "service_group.services.handlers",
            Self::Uuid => "uuid",
            Self::Name => "name",
            Self::Fqdn => "fqdn",
            Self::PrivateFqdn => "private_fqdn",
            Self::PrivateIp => "private_ip",
            Self::State => "state",
            Self::CreatedAt => "created_at",
            Self::Env => "env",
            Self::BootTimeUs => "boot_time_us",
            Self::NetworkInterfaces => "network_interfaces",
            Self::ServiceGroupUuid => "service_group.uuid",
            Self::ServiceGroupName => "service_group.name",
        }
    }

    /// Look up the attribute's classification in [`REPLACEMENT_POLICY`].
    #[must_use]
    pub fn policy(self) -> Replacement {
        REPLACEMENT_POLICY
            .iter()
            .find(|(attr, _)| *attr == self)
            .map_or(Replacement::NoOp, |(_, policy)| *policy)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Classification of every attribute.
pub const REPLACEMENT_POLICY: &[(Attribute, Replacement)] = &[
    (Attribute::Image, Replacement::ForceReplace),
    (Attribute::Args, Replacement::ForceReplaceIfWasConfigured),
    (Attribute::MemoryMb, Replacement::ForceReplaceIfWasConfigured),
    (Attribute::Autostart, Replacement::ForceReplaceIfWasConfigured),
    (Attribute::Services, Replacement::ForceReplace),
    (Attribute::ServicePort, Replacement::ForceReplace),
    (Attribute::DestinationPort, Replacement::ForceReplaceIfWasConfigured),
    (Attribute::Handlers, Replacement::ForceReplaceIfWasConfigured),
    (Attribute::Uuid, Replacement::NoOp),
    (Attribute::Name, Replacement::NoOp),
    (Attribute::Fqdn, Replacement::NoOp),
    (Attribute::PrivateFqdn, Replacement::NoOp),
    (Attribute::PrivateIp, Replacement::NoOp),
    (Attribute::State, Replacement::NoOp),
    (Attribute::CreatedAt, Replacement::NoOp),
    (Attribute::Env, Replacement::NoOp),
    (Attribute::BootTimeUs, Replacement::NoOp),
    (Attribute::NetworkInterfaces, Replacement::NoOp),
    (Attribute::ServiceGroupUuid, Replacement::NoOp),
    (Attribute::ServiceGroupName, Replacement::NoOp),
];

/// Classify a change of `attribute` from `prior` to `new`.
///
/// `None` means unset.
#[must_use]
pub fn classify<T: PartialEq + ?Sized>(
    attribute: Attribute,
    prior: Option<&T>,
    new: Option<&T>,
) -> Replacement {
    if prior == new {
        return Replacement::NoOp;
    }
    match attribute.policy() {
        Replacement::ForceReplaceIfWasConfigured if new.is_none() => Replacement::NoOp,
        policy => policy,
    }
}

/// One classified difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// The attribute.
    pub attribute: Attribute,
    /// Concrete path, with service index where applicable.
    pub path: String,
    /// Classification.
    pub verdict: Replacement,
}

/// Differences between a prior state and a new configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    changes: Vec<Change>,
}

impl Plan {
    /// Compare the configured attributes of `prior` with `config`.
    ///
    /// `config` is resolved first, so a destination port that changes
    /// because its default changed is reported as well.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if `config` is invalid.
    pub fn compute(prior: &InstanceState, config: &InstanceConfig) -> Result<Self, ValidationError> {
        let resolved = defaults::resolve(config)?;
        let mut plan = Self::default();

        plan.push(
            Attribute::Image,
            Attribute::Image.path().to_string(),
            classify(Attribute::Image, Some(prior.image.as_str()), Some(resolved.image.as_str())),
        );
        plan.push(
            Attribute::Args,
            Attribute::Args.path().to_string(),
            classify(Attribute::Args, prior.args.as_ref(), resolved.args.as_ref()),
        );

        // Only an explicit, non-zero memory size counts as configured.
        let configured_memory = config
            .memory_mb
            .filter(|m| *m != 0)
            .map(|_| resolved.memory_mb);
        plan.push(
            Attribute::MemoryMb,
            Attribute::MemoryMb.path().to_string(),
            classify(
                Attribute::MemoryMb,
                prior.memory_mb.as_ref(),
                configured_memory.as_ref(),
            ),
        );
        plan.push(
            Attribute::Autostart,
            Attribute::Autostart.path().to_string(),
            classify(
                Attribute::Autostart,
                prior.autostart.as_ref(),
                resolved.autostart.as_ref(),
            ),
        );

        let prior_services = prior
            .service_group
            .as_ref()
            .and_then(|g| g.services.as_deref())
            .unwrap_or_default();
        let new_services = resolved.services.as_deref().unwrap_or_default();

        if prior_services.len() == new_services.len() {
            for (i, (old, new)) in prior_services.iter().zip(new_services).enumerate() {
                let at = |field: &str| format!("service_group.services[{i}].{field}");
                plan.push(
                    Attribute::ServicePort,
                    at("port"),
                    classify(Attribute::ServicePort, Some(&old.port), Some(&new.port)),
                );
                plan.push(
                    Attribute::DestinationPort,
                    at("destination_port"),
                    classify(
                        Attribute::DestinationPort,
                        Some(&old.destination_port),
                        Some(&new.destination_port),
                    ),
                );
                plan.push(
                    Attribute::Handlers,
                    at("handlers"),
                    classify(Attribute::Handlers, Some(&old.handlers), Some(&new.handlers)),
                );
            }
        } else {
            plan.push(
                Attribute::Services,
                Attribute::Services.path().to_string(),
                classify(Attribute::Services, Some(prior_services), Some(new_services)),
            );
        }

        Ok(plan)
    }

    fn push(&mut self, attribute: Attribute, path: String, verdict: Replacement) {
        if verdict != Replacement::NoOp {
            self.changes.push(Change {
                attribute,
                path,
                verdict,
            });
        }
    }

    /// Classified changes, excluding no-ops.
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns true if any change requires replacement.
    #[must_use]
    pub fn requires_replace(&self) -> bool {
        self.changes.iter().any(|c| c.verdict.requires_replace())
    }

    /// Paths of all changed attributes.
    #[must_use]
    pub fn changed_paths(&self) -> Vec<String> {
        self.changes.iter().map(|c| c.path.clone()).collect()
    }
}
