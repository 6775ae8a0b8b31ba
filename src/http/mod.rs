//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, route precedence)
//!     → admin routes (/health, /config) or proxy::handler::forward
//! ```

pub mod server;

pub use server::{AppState, GatewayServer};
