//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from the JSON config
//! file.

use serde::{Deserialize, Serialize};

/// Root configuration for the forwarding gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single fixed backend all traffic is forwarded to.
    pub target: Target,

    /// Upstream forward proxy the backend is reached through.
    pub upstream_proxy: UpstreamProxy,

    /// Forwarding behavior switches (header mode, body cap, origin rewrite).
    pub forwarding: ForwardingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Copy of the configuration safe to expose on the admin surface.
    pub fn redacted(&self) -> GatewayConfig {
        let mut copy = self.clone();
        if !copy.upstream_proxy.password.is_empty() {
            copy.upstream_proxy.password = "********".to_string();
        }
        copy
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// URL scheme of the backend target.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetScheme {
    Http,
    Https,
}

impl TargetScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetScheme::Http => "http",
            TargetScheme::Https => "https",
        }
    }
}

impl Default for TargetScheme {
    fn default() -> Self {
        TargetScheme::Http
    }
}

/// The fixed backend host all inbound traffic is relayed to.
///
/// Immutable for the lifetime of a request; replaced wholesale on config
/// reload.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Target {
    pub scheme: TargetScheme,
    pub hostname: String,
}

impl Target {
    /// Origin string exactly as used on the wire, e.g. `http://backend.example.com`.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.hostname)
    }
}

impl Default for Target {
    fn default() -> Self {
        Self {
            scheme: TargetScheme::Http,
            hostname: "backend.example.com".to_string(),
        }
    }
}

/// Upstream forward proxy address and Basic-auth credentials.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamProxy {
    pub host: String,
    pub port: u16,

    /// Basic-auth username; empty disables Proxy-Authorization.
    pub username: String,
    pub password: String,

    /// Whether the proxy link itself is TLS-wrapped.
    pub tls: bool,

    /// Skip certificate verification on the proxy link. The proxy is
    /// identified by address and credentials, not PKI.
    pub tls_skip_verify: bool,
}

impl UpstreamProxy {
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }
}

impl Default for UpstreamProxy {
    fn default() -> Self {
        Self {
            host: "proxy.example.com".to_string(),
            port: 443,
            // WARNING: placeholders! Change these in production.
            username: "CHANGE_ME".to_string(),
            password: "CHANGE_ME".to_string(),
            tls: true,
            tls_skip_verify: true,
        }
    }
}

/// Header-forwarding mode.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderMode {
    /// Relay the caller's headers, minus the strip table.
    PassThrough,
    /// Replace the caller's headers with a fixed browser-like identity set.
    SpoofedIdentity,
}

impl Default for HeaderMode {
    fn default() -> Self {
        HeaderMode::PassThrough
    }
}

/// Forwarding behavior switches.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Header-forwarding mode (see [`HeaderMode`]).
    pub header_mode: HeaderMode,

    /// Verify the backend certificate inside the CONNECT tunnel.
    pub backend_tls_verify: bool,

    /// Origin used when rewriting backend redirects, e.g.
    /// "http://gateway.example.com". When unset, derived from the caller's
    /// Host header.
    pub public_origin: Option<String>,

    /// Maximum inbound request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            header_mode: HeaderMode::PassThrough,
            backend_tls_verify: false,
            public_origin: None,
            max_body_bytes: 10 * 1024 * 1024, // 10 MiB
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TCP connect timeout to the upstream proxy, in seconds.
    pub connect_secs: u64,

    /// End-to-end deadline for one forwarding operation
    /// (connect + request + full response drain), in seconds.
    pub forward_secs: u64,

    /// Outer guard on the whole inbound request, in seconds. Must exceed
    /// `forward_secs` or the guard fires before the 504 mapping can.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            forward_secs: 60,
            request_secs: 75,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
