//! Single-backend forwarding gateway.
//!
//! Accepts inbound HTTP on a local listener and relays every request to one
//! fixed backend host through an authenticated upstream forward proxy,
//! relaying the response back with a bounded set of header rewrites.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client Request        ┌──────────────────────────────────────────────┐
//!   ─────────────────────▶│  http::server ──▶ proxy::handler             │
//!                         │                     │                        │
//!                         │        proxy::policy (outbound headers)      │
//!                         │                     │                        │
//!                         │        proxy::transport ────────────────────▶│──▶ forward proxy ──▶ backend
//!                         │          plain (absolute-form) or            │
//!                         │          CONNECT tunnel + TLS                │
//!                         │                     │                        │
//!   Client Response       │        proxy::policy (response rewrite,      │
//!   ◀─────────────────────│                      Location → public)      │
//!                         │                                              │
//!                         │  config (JSON, hot reload) · admin (/health, │
//!                         │  /config) · observability · lifecycle        │
//!                         └──────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod proxy;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
