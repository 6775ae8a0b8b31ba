//! The forwarding core.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → handler.rs (state machine for one request)
//!     → policy.rs (outbound header set)
//!     → transport.rs (proxy link, plain or CONNECT tunnel, full drain)
//!     → policy.rs (response header set, Location rewrite)
//!     → caller
//! ```
//!
//! # Design Decisions
//! - One transport with a tagged mode (absolute-form vs tunnel) selected by
//!   target scheme, not per-scheme handlers
//! - The upstream body is drained in full before the status line is written
//!   to the caller, so rewriting always precedes the first flushed byte
//! - Single attempt per request; retries are an operational concern

pub mod error;
pub mod handler;
pub mod policy;
pub mod transport;

pub use error::{GatewayError, GatewayResult};
pub use transport::{ProxyTransport, UpstreamResponse};
