//! Lifecycle management subsystem.
//!
//! Startup order is main's concern: config first, then the listener, then
//! the watcher and server. Shutdown flows through a broadcast channel:
//! SIGTERM/ctrl-c → trigger → listeners stop accepting, in-flight requests
//! drain, tasks exit.

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
