//! Configuration validation.
//!
//! Semantic checks on top of what serde already guarantees syntactically.
//! Validation is a pure function and reports every problem it finds, not
//! just the first one. It runs before a configuration is accepted into the
//! system, both at startup and on reload.

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            message: format!("not a valid socket address: {:?}", config.listener.bind_address),
        });
    }

    if config.target.hostname.is_empty() {
        errors.push(ValidationError {
            field: "target.hostname",
            message: "must not be empty".to_string(),
        });
    } else if url::Host::parse(&config.target.hostname).is_err() {
        errors.push(ValidationError {
            field: "target.hostname",
            message: format!("not a valid host: {:?}", config.target.hostname),
        });
    }

    if config.upstream_proxy.host.is_empty() {
        errors.push(ValidationError {
            field: "upstream_proxy.host",
            message: "must not be empty".to_string(),
        });
    }
    if config.upstream_proxy.port == 0 {
        errors.push(ValidationError {
            field: "upstream_proxy.port",
            message: "must not be zero".to_string(),
        });
    }

    if let Some(origin) = &config.forwarding.public_origin {
        match Url::parse(origin) {
            Ok(url) => {
                if !matches!(url.scheme(), "http" | "https") {
                    errors.push(ValidationError {
                        field: "forwarding.public_origin",
                        message: format!("scheme must be http or https, got {:?}", url.scheme()),
                    });
                }
                if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
                    errors.push(ValidationError {
                        field: "forwarding.public_origin",
                        message: "must be an origin only, without path or query".to_string(),
                    });
                }
            }
            Err(e) => errors.push(ValidationError {
                field: "forwarding.public_origin",
                message: format!("not a valid URL: {e}"),
            }),
        }
    }

    if config.forwarding.max_body_bytes == 0 {
        errors.push(ValidationError {
            field: "forwarding.max_body_bytes",
            message: "must not be zero".to_string(),
        });
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.connect_secs",
            message: "must not be zero".to_string(),
        });
    }
    if config.timeouts.forward_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.forward_secs",
            message: "must not be zero".to_string(),
        });
    }
    if config.timeouts.request_secs <= config.timeouts.forward_secs {
        errors.push(ValidationError {
            field: "timeouts.request_secs",
            message: format!(
                "must exceed timeouts.forward_secs ({})",
                config.timeouts.forward_secs
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
