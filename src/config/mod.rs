//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON)
//!     → loader.rs (parse & deserialize, default written if absent)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared as an ArcSwap snapshot to all subsystems
//!
//! On reload:
//!     watcher.rs detects change (debounced)
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the snapshot
//!     → in-flight requests keep their old snapshot; new requests see the new one
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a full reload
//! - All fields have defaults to allow minimal configs
//! - An invalid reload keeps the last-known-good configuration

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    ForwardingConfig, GatewayConfig, HeaderMode, ListenerConfig, ObservabilityConfig, Target,
    TargetScheme, TimeoutConfig, UpstreamProxy,
};
