//! Client-side defaults and validation.
//!
//! The API rejects a zero memory size and needs explicit destination ports
//! and handlers, so those defaults are filled in here before the create
//! call. Everything in this module is pure.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use kraftcloud_client::Handler;

use crate::error::ValidationError;
use crate::state::{InstanceConfig, ResolvedConfig, ServiceConfig, ServiceState};

/// Memory used when none is configured.
pub const DEFAULT_MEMORY_MB: u32 = 128;

/// Accepted memory sizes in megabytes.
pub const MEMORY_RANGE_MB: RangeInclusive<i64> = 16..=256;

/// Accepted port numbers.
pub const PORT_RANGE: RangeInclusive<i64> = 1..=65535;

/// Handler applied when a service configures none.
pub const DEFAULT_HANDLER: Handler = Handler::Tls;

/// Resolve the memory size.
///
/// # Errors
///
/// Returns a `ValidationError` if a non-zero value lies outside
/// [`MEMORY_RANGE_MB`].
pub fn resolve_memory(memory_mb: Option<i64>) -> Result<u32, ValidationError> {
    match memory_mb {
        None | Some(0) => Ok(DEFAULT_MEMORY_MB),
        Some(m) if MEMORY_RANGE_MB.contains(&m) => {
            u32::try_from(m).map_err(|_| out_of_range("memory_mb", &MEMORY_RANGE_MB, m))
        }
        Some(m) => Err(out_of_range("memory_mb", &MEMORY_RANGE_MB, m)),
    }
}

/// Validate a port number.
///
/// # Errors
///
/// Returns a `ValidationError` naming `attribute` if `port` lies outside
/// [`PORT_RANGE`].
pub fn resolve_port(attribute: &str, port: i64) -> Result<u16, ValidationError> {
    if PORT_RANGE.contains(&port) {
        u16::try_from(port).map_err(|_| out_of_range(attribute, &PORT_RANGE, port))
    } else {
        Err(out_of_range(attribute, &PORT_RANGE, port))
    }
}

/// Resolve a handler set, defaulting to `{tls}`.
///
/// # Errors
///
/// Returns a `ValidationError` for unknown handler names.
pub fn resolve_handlers(
    attribute: &str,
    handlers: Option<&BTreeSet<String>>,
) -> Result<BTreeSet<Handler>, ValidationError> {
    let Some(handlers) = handlers else {
        return Ok(BTreeSet::from([DEFAULT_HANDLER]));
    };

    handlers
        .iter()
        .map(|name| {
            name.parse::<Handler>().map_err(|unknown| {
                ValidationError::new(
                    attribute,
                    format!(
                        "unknown handler {unknown:?}, expected one of: {}",
                        Handler::ALL.map(Handler::as_str).join(", ")
                    ),
                )
            })
        })
        .collect()
}

/// Resolve a single service at `index`.
///
/// # Errors
///
/// Returns a `ValidationError` for an invalid port or handler.
pub fn resolve_service(index: usize, service: &ServiceConfig) -> Result<ServiceState, ValidationError> {
    let prefix = format!("service_group.services[{index}]");
    let port = resolve_port(&format!("{prefix}.port"), service.port)?;
    let destination_port = match service.destination_port {
        Some(p) => resolve_port(&format!("{prefix}.destination_port"), p)?,
        None => port,
    };
    let handlers = resolve_handlers(&format!("{prefix}.handlers"), service.handlers.as_ref())?;

    Ok(ServiceState {
        port,
        destination_port,
        handlers,
    })
}

/// Apply every default and validate the result.
///
/// # Errors
///
/// Returns the first `ValidationError` found.
pub fn resolve(config: &InstanceConfig) -> Result<ResolvedConfig, ValidationError> {
    if config.image.trim().is_empty() {
        return Err(ValidationError::new("image", "must not be empty"));
    }

    let memory_mb = resolve_memory(config.memory_mb)?;

    let services = config
        .service_group
        .as_ref()
        .map(|group| {
            group
                .services
                .iter()
                .enumerate()
                .map(|(i, s)| resolve_service(i, s))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    Ok(ResolvedConfig {
        image: config.image.clone(),
        args: config.args.clone(),
        memory_mb,
        autostart: config.autostart,
        services,
    })
}

fn out_of_range(attribute: &str, range: &RangeInclusive<i64>, value: i64) -> ValidationError {
    ValidationError::new(
        attribute,
        format!(
            "must be between {} and {}, got {value}",
            range.start(),
            range.end()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ServiceGroupConfig;

    #[test]
    fn memory_defaults_and_bounds() {
        assert_eq!(resolve_memory(None), Ok(128));
        assert_eq!(resolve_memory(Some(0)), Ok(128));
        assert_eq!(resolve_memory(Some(16)), Ok(16));
        assert_eq!(resolve_memory(Some(256)), Ok(256));

        for bad in [-1, 1, 15, 257, 4096] {
            let err = resolve_memory(Some(bad)).unwrap_err();
            assert_eq!(err.attribute, "memory_mb");
            assert!(err.constraint.contains("between 16 and 256"), "{err}");
        }
    }

    #[test]
    fn every_memory_value_in_range_is_kept() {
        for m in MEMORY_RANGE_MB {
            assert_eq!(resolve_memory(Some(m)), Ok(u32::try_from(m).unwrap()));
        }
    }

    #[test]
    fn port_bounds() {
        assert_eq!(resolve_port("port", 1), Ok(1));
        assert_eq!(resolve_port("port", 65535), Ok(65535));
        assert!(resolve_port("port", 0).is_err());
        assert!(resolve_port("port", 65536).is_err());
        assert!(resolve_port("port", -80).is_err());
    }

    #[test]
    fn destination_port_defaults_to_port() {
        for port in [1, 80, 443, 8080, 65535] {
            let service = resolve_service(0, &ServiceConfig::new(port)).unwrap();
            assert_eq!(i64::from(service.destination_port), port);
        }

        let explicit = ServiceConfig {
            destination_port: Some(8080),
            ..ServiceConfig::new(443)
        };
        assert_eq!(resolve_service(0, &explicit).unwrap().destination_port, 8080);
    }

    #[test]
    fn handlers_default_to_tls() {
        let service = resolve_service(0, &ServiceConfig::new(443)).unwrap();
        assert_eq!(service.handlers, BTreeSet::from([Handler::Tls]));
    }

    #[test]
    fn unknown_handler_is_rejected_with_path() {
        let service = ServiceConfig {
            handlers: Some(BTreeSet::from(["http".to_string(), "quic".to_string()])),
            ..ServiceConfig::new(443)
        };
        let err = resolve_service(2, &service).unwrap_err();
        assert_eq!(err.attribute, "service_group.services[2].handlers");
        assert!(err.constraint.contains("\"quic\""));
    }

    #[test]
    fn resolve_applies_all_defaults() {
        let config = InstanceConfig::new("repo/nginx:latest").with_port(80);
        let resolved = resolve(&config).unwrap();

        assert_eq!(resolved.memory_mb, 128);
        assert_eq!(resolved.args, None);
        let services = resolved.services.unwrap();
        assert_eq!(services[0].port, 80);
        assert_eq!(services[0].destination_port, 80);
        assert_eq!(services[0].handlers, BTreeSet::from([Handler::Tls]));
    }

    #[test]
    fn resolve_reports_service_index() {
        let config = InstanceConfig {
            service_group: Some(ServiceGroupConfig {
                services: vec![ServiceConfig::new(443), ServiceConfig::new(70000)],
            }),
            ..InstanceConfig::new("nginx:latest")
        };
        let err = resolve(&config).unwrap_err();
        assert_eq!(err.attribute, "service_group.services[1].port");
    }

    #[test]
    fn empty_image_is_rejected() {
        let err = resolve(&InstanceConfig::new("  ")).unwrap_err();
        assert_eq!(err.attribute, "image");
    }
}
