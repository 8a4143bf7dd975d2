//! Schema declarations exposed to the host.
//!
//! The host validates configuration and plans replacements from these
//! declarations. Replacement annotations are read from
//! [`REPLACEMENT_POLICY`](crate::policy::REPLACEMENT_POLICY) and validator
//! bounds from [`crate::defaults`], so the host and this crate apply the
//! same rules.

use kraftcloud_client::{Handler, InstanceStatus};
use serde::Serialize;
use serde_json::Value;

use crate::defaults::{MEMORY_RANGE_MB, PORT_RANGE};
use crate::error::ValidationError;
use crate::policy::{Attribute, Replacement, REPLACEMENT_POLICY};

/// Type name of the instance resource and data source.
pub const INSTANCE_TYPE: &str = "kraftcloud_instance";

/// Type name of the instance list data source.
pub const INSTANCES_TYPE: &str = "kraftcloud_instances";

/// Who supplies an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Must be set by the author.
    Required,
    /// May be set by the author.
    Optional,
    /// May be set by the author; otherwise the value is computed.
    OptionalComputed,
    /// Always computed.
    Computed,
}

impl AttributeKind {
    /// Returns true if the author may set this attribute.
    #[must_use]
    pub const fn is_configurable(self) -> bool {
        !matches!(self, Self::Computed)
    }
}

/// Shape of an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// String.
    String,
    /// 64-bit integer.
    Int64,
    /// Boolean.
    Bool,
    /// Ordered list of strings.
    StringList,
    /// Unordered set of strings.
    StringSet,
    /// String-to-string map.
    StringMap,
    /// Ordered list of nested objects.
    ObjectList,
}

/// Value constraint checked by the host before planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    /// Integer within an inclusive range.
    IntBetween(i64, i64),
    /// String, or every element of a string collection, from a fixed set.
    OneOf(Vec<&'static str>),
}

impl Validator {
    /// Check `value` against this validator. Null values pass.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` naming `attribute` if the value violates
    /// the constraint.
    pub fn validate(&self, attribute: &str, value: &Value) -> Result<(), ValidationError> {
        match (self, value) {
            (_, Value::Null) => Ok(()),
            (Self::IntBetween(min, max), Value::Number(n)) => match n.as_i64() {
                Some(v) if (*min..=*max).contains(&v) => Ok(()),
                _ => Err(ValidationError::new(
                    attribute,
                    format!("must be between {min} and {max}, got {n}"),
                )),
            },
            (Self::OneOf(allowed), Value::String(s)) => {
                if allowed.contains(&s.as_str()) {
                    Ok(())
                } else {
                    Err(ValidationError::new(
                        attribute,
                        format!("{s:?} is not one of: {}", allowed.join(", ")),
                    ))
                }
            }
            (Self::OneOf(_), Value::Array(items)) => items
                .iter()
                .try_for_each(|item| self.validate(attribute, item)),
            _ => Err(ValidationError::new(attribute, "value has the wrong type")),
        }
    }
}

/// Declaration of one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSchema {
    /// Attribute path.
    pub path: &'static str,
    /// Who supplies the value.
    pub kind: AttributeKind,
    /// Value shape.
    pub value_type: ValueType,
    /// Constraints.
    pub validators: Vec<Validator>,
    /// Replacement annotation.
    pub replacement: Replacement,
    /// Whether the prior state value is kept while the planned value is
    /// unknown.
    pub use_state_for_unknown: bool,
    /// Human-readable description.
    pub description: &'static str,
}

/// Declaration of a resource or data source type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSchema {
    /// Type name.
    pub type_name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Attributes.
    pub attributes: Vec<AttributeSchema>,
    /// Attribute that import identifiers are written to.
    pub import_id: Option<&'static str>,
    /// Attributes that import cannot reproduce and verification skips.
    pub import_verify_ignore: Vec<&'static str>,
}

impl ResourceSchema {
    /// Look up an attribute by path.
    #[must_use]
    pub fn attribute(&self, path: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.path == path)
    }

    /// Check `value` against the validators of the attribute at `path`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for unknown attributes and for values
    /// that violate a validator.
    pub fn validate(&self, path: &str, value: &Value) -> Result<(), ValidationError> {
        let attribute = self
            .attribute(path)
            .ok_or_else(|| ValidationError::new(path, "unknown attribute"))?;
        attribute
            .validators
            .iter()
            .try_for_each(|v| v.validate(path, value))
    }
}

fn handler_names() -> Vec<&'static str> {
    Handler::ALL.iter().map(|h| h.as_str()).collect()
}

fn state_names() -> Vec<&'static str> {
    InstanceStatus::ALL.iter().map(|s| s.as_str()).collect()
}

fn port_range() -> Validator {
    Validator::IntBetween(*PORT_RANGE.start(), *PORT_RANGE.end())
}

fn describe(attribute: Attribute) -> (AttributeKind, ValueType, Vec<Validator>, &'static str) {
    use AttributeKind::{Computed, Optional, OptionalComputed, Required};

    match attribute {
        Attribute::Image => (Required, ValueType::String, vec![], "Image reference"),
        Attribute::Args => (Optional, ValueType::StringList, vec![], "Startup arguments"),
        Attribute::MemoryMb => (
            OptionalComputed,
            ValueType::Int64,
            vec![Validator::IntBetween(
                *MEMORY_RANGE_MB.start(),
                *MEMORY_RANGE_MB.end(),
            )],
            "Memory in megabytes; 128 when unset",
        ),
        Attribute::Autostart => (
            Optional,
            ValueType::Bool,
            vec![],
            "Start the instance on incoming traffic",
        ),
        Attribute::Services => (
            Optional,
            ValueType::ObjectList,
            vec![],
            "Published services",
        ),
        Attribute::ServicePort => (Required, ValueType::Int64, vec![port_range()], "Public port"),
        Attribute::DestinationPort => (
            OptionalComputed,
            ValueType::Int64,
            vec![port_range()],
            "Port inside the instance; the public port when unset",
        ),
        Attribute::Handlers => (
            OptionalComputed,
            ValueType::StringSet,
            vec![Validator::OneOf(handler_names())],
            "Protocol handlers; tls when unset",
        ),
        Attribute::Uuid => (Computed, ValueType::String, vec![], "Unique identifier of the instance"),
        Attribute::Name => (Computed, ValueType::String, vec![], "Name of the instance"),
        Attribute::Fqdn => (Computed, ValueType::String, vec![], "Public FQDN"),
        Attribute::PrivateFqdn => (Computed, ValueType::String, vec![], "Private FQDN"),
        Attribute::PrivateIp => (Computed, ValueType::String, vec![], "Private IPv4 address"),
        Attribute::State => (
            Computed,
            ValueType::String,
            vec![Validator::OneOf(state_names())],
            "Lifecycle state",
        ),
        Attribute::CreatedAt => (Computed, ValueType::String, vec![], "Creation time (RFC 3339)"),
        Attribute::Env => (Computed, ValueType::StringMap, vec![], "Environment variables"),
        Attribute::BootTimeUs => (
            Computed,
            ValueType::Int64,
            vec![],
            "Duration of the last boot in microseconds",
        ),
        Attribute::NetworkInterfaces => (
            Computed,
            ValueType::ObjectList,
            vec![],
            "Attached network interfaces",
        ),
        Attribute::ServiceGroupUuid => (Computed, ValueType::String, vec![], "Service group identifier"),
        Attribute::ServiceGroupName => (Computed, ValueType::String, vec![], "Service group name"),
    }
}

/// Schema of the `kraftcloud_instance` resource.
#[must_use]
pub fn instance_schema() -> ResourceSchema {
    let attributes = REPLACEMENT_POLICY
        .iter()
        .map(|&(attribute, replacement)| {
            let (kind, value_type, validators, description) = describe(attribute);
            AttributeSchema {
                path: attribute.path(),
                kind,
                value_type,
                validators,
                replacement,
                use_state_for_unknown: replacement == Replacement::ForceReplaceIfWasConfigured
                    || attribute == Attribute::Uuid,
                description,
            }
        })
        .collect();

    ResourceSchema {
        type_name: INSTANCE_TYPE,
        description: "A KraftCloud instance and its published services",
        attributes,
        import_id: Some(Attribute::Uuid.path()),
        import_verify_ignore: vec![Attribute::Services.path(), Attribute::Image.path()],
    }
}

/// Schema of the `kraftcloud_instance` data source.
///
/// Every attribute is computed except the UUID used for the lookup.
#[must_use]
pub fn instance_data_source_schema() -> ResourceSchema {
    let attributes = REPLACEMENT_POLICY
        .iter()
        .filter(|(attribute, _)| {
            !matches!(
                attribute,
                Attribute::Autostart
                    | Attribute::Services
                    | Attribute::ServicePort
                    | Attribute::DestinationPort
                    | Attribute::Handlers
            )
        })
        .map(|&(attribute, _)| {
            let (_, value_type, _, description) = describe(attribute);
            AttributeSchema {
                path: attribute.path(),
                kind: if attribute == Attribute::Uuid {
                    AttributeKind::Required
                } else {
                    AttributeKind::Computed
                },
                value_type,
                validators: vec![],
                replacement: Replacement::NoOp,
                use_state_for_unknown: false,
                description,
            }
        })
        .collect();

    ResourceSchema {
        type_name: INSTANCE_TYPE,
        description: "Look up a KraftCloud instance by UUID",
        attributes,
        import_id: None,
        import_verify_ignore: vec![],
    }
}

/// Schema of the `kraftcloud_instances` data source.
#[must_use]
pub fn instances_data_source_schema() -> ResourceSchema {
    let computed = |path, value_type, description| AttributeSchema {
        path,
        kind: AttributeKind::Computed,
        value_type,
        validators: vec![],
        replacement: Replacement::NoOp,
        use_state_for_unknown: false,
        description,
    };

    ResourceSchema {
        type_name: INSTANCES_TYPE,
        description: "List KraftCloud instances",
        attributes: vec![
            computed("instances", ValueType::ObjectList, "Instances, sorted by name"),
            computed("instances.uuid", ValueType::String, "Unique identifier of the instance"),
            computed("instances.name", ValueType::String, "Name of the instance"),
        ],
        import_id: None,
        import_verify_ignore: vec![],
    }
}
